//! Legal JavaScript identifiers for generated bindings

const RESERVED: &[&str] = &[
    "break", "case", "class", "catch", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "let", "new", "return", "super", "switch", "this", "throw", "try", "typeof",
    "var", "void", "while", "with", "yield", "enum", "await", "implements", "package",
    "protected", "static", "interface", "private", "public",
];

const BUILTINS: &[&str] = &[
    "Infinity", "NaN", "undefined", "null", "true", "false", "eval", "uneval", "isFinite",
    "isNaN", "parseFloat", "parseInt", "decodeURI", "decodeURIComponent", "encodeURI",
    "encodeURIComponent", "escape", "unescape", "Object", "Function", "Boolean", "Symbol",
    "Error", "EvalError", "InternalError", "RangeError", "ReferenceError", "SyntaxError",
    "TypeError", "URIError", "Number", "Math", "Date", "String", "RegExp", "Array", "Int8Array",
    "Uint8Array", "Uint8ClampedArray", "Int16Array", "Uint16Array", "Int32Array", "Uint32Array",
    "Float32Array", "Float64Array", "Map", "Set", "WeakMap", "WeakSet", "SIMD", "ArrayBuffer",
    "DataView", "JSON", "Promise", "Generator", "GeneratorFunction", "Reflect", "Proxy", "Intl",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || BUILTINS.contains(&name)
}

/// Turn an arbitrary string (usually a file name or package id) into a
/// usable binding name: `my-lib` becomes `myLib`, other illegal characters
/// become `_`, and names that start with a digit or clash with a keyword or
/// builtin get a leading `_`.
pub fn make_legal_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    out.extend(next.to_uppercase());
                    chars.next();
                    continue;
                }
            }
        }
        if c.is_ascii_alphanumeric() || c == '$' || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }

    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) || is_reserved(&out) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_legal_identifier() {
        assert_eq!(make_legal_identifier("my-lib"), "myLib");
        assert_eq!(make_legal_identifier("lodash/fp"), "lodash_fp");
        assert_eq!(make_legal_identifier("2d"), "_2d");
        assert_eq!(make_legal_identifier("default"), "_default");
        assert_eq!(make_legal_identifier("Math"), "_Math");
        assert_eq!(make_legal_identifier("@scope/pkg.name"), "_scope_pkg_name");
        assert_eq!(make_legal_identifier(""), "_");
    }
}
