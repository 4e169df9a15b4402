pub struct Icons;

impl Icons {
    pub const PACKAGE: &str = "📦";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const INFO: &str = "ℹ️";
    pub const FILE: &str = "📄";
    pub const MAP: &str = "🗺️";
    pub const TREE: &str = "🌳";
    pub const CLOCK: &str = "⏱️";
}
