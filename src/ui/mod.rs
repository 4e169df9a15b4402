pub mod icons;
pub mod output;
pub mod progress;
pub mod table;

pub use icons::Icons;
pub use output::{Tone, dim, error, file_written, header, human_bytes, info, success, summary_row, timing};
pub use progress::Spinner;
pub use table::{TableBuilder, build_stats_table};
