//! End-to-end builds against an in-memory module set

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use shakepack::loader::{LoadedSource, Loader, ResolvedId, Resolver, SourceDescription, Transform};
use shakepack::magic::MapOptions;
use shakepack::{
    Bundle, BundleOptions, ExportModeOption, Format, GenerateOptions, MagicString, SourceLocation, SourceMapOption,
};

/// `./name` resolves to `/name.js`; anything not in the set is external.
struct Memory(HashMap<&'static str, &'static str>);

#[async_trait]
impl Loader for Memory {
    async fn load(&self, id: &str) -> shakepack::Result<Option<LoadedSource>> {
        Ok(self.0.get(id).map(|&code| code.into()))
    }
}

#[async_trait]
impl Resolver for Memory {
    async fn resolve(&self, importee: &str, _importer: Option<&str>) -> shakepack::Result<Option<ResolvedId>> {
        let id = format!("/{}.js", importee.trim_start_matches("./").trim_end_matches(".js"));
        if self.0.contains_key(id.as_str()) {
            Ok(Some(ResolvedId::Module(id)))
        } else {
            Ok(Some(ResolvedId::External(importee.to_string())))
        }
    }
}

async fn build(modules: &[(&'static str, &'static str)]) -> shakepack::Result<Bundle> {
    let memory = Arc::new(Memory(modules.iter().copied().collect()));
    Bundle::build(BundleOptions::new("main").loader(memory.clone()).resolver(memory)).await
}

fn es6(bundle: &Bundle) -> String {
    bundle.generate(&GenerateOptions::new(Format::Es6)).unwrap().code
}

#[tokio::test]
async fn test_unused_declarator_is_dropped() {
    let bundle = build(&[
        ("/main.js", "import { used } from './lib';\nconsole.log(used);"),
        ("/lib.js", "export var used = 1, unused = 2;"),
    ])
    .await
    .unwrap();
    let code = es6(&bundle);
    assert!(code.contains("var used = 1;"));
    assert!(!code.contains("unused"));
    assert!(!code.contains("2"));
}

#[tokio::test]
async fn test_adjacent_multi_declarator_statements() {
    let bundle = build(&[
        ("/main.js", "import { b, c } from './lib';\nconsole.log(b, c);"),
        ("/lib.js", "export var a = 1, b = 2;\nexport var c = 3, d = 4;"),
    ])
    .await
    .unwrap();
    let code = es6(&bundle);
    assert_eq!(code, "var b = 2;\nvar c = 3;\n\nconsole.log(b, c);");
}

#[tokio::test]
async fn test_unused_module_code_is_dropped() {
    let bundle = build(&[
        ("/main.js", "import { square } from './maths';\nconsole.log(square(5));"),
        (
            "/maths.js",
            "export function square (x) { return x * x; }\nexport function cube (x) { return x * x * x; }",
        ),
    ])
    .await
    .unwrap();
    let code = es6(&bundle);
    assert_eq!(code, "function square (x) { return x * x; }\n\nconsole.log(square(5));");
}

#[tokio::test]
async fn test_cycle_renders_eager_dependency_first() {
    let bundle = build(&[
        ("/main.js", "import { a, getB } from './a';\nconsole.log(a, getB());"),
        ("/a.js", "import { b } from './b';\nexport var a = 1;\nexport function getB () { return b; }"),
        ("/b.js", "import { a } from './a';\nexport var b = a + 1;"),
    ])
    .await
    .unwrap();
    let code = es6(&bundle);
    let a = code.find("var a = 1;").unwrap();
    let b = code.find("var b = a + 1;").unwrap();
    let call = code.find("console.log(a, getB());").unwrap();
    assert!(a < b);
    assert!(b < call);
}

#[tokio::test]
async fn test_colliding_names_are_deconflicted() {
    let bundle = build(&[
        ("/main.js", "import { count as total } from './other';\nvar count = 1;\nconsole.log(count, total);"),
        ("/other.js", "var count = 2;\nexport { count };"),
    ])
    .await
    .unwrap();
    let code = es6(&bundle);
    assert!(code.contains("var count = 2;"));
    assert!(code.contains("var count$1 = 1;"));
    assert!(code.contains("console.log(count$1, count);"));
}

#[tokio::test]
async fn test_named_external_import_does_not_collide() {
    let bundle = build(&[
        ("/main.js", "import { c } from 'ext';\nimport { get } from './a';\nconsole.log(c, get());"),
        ("/a.js", "var c = 2;\nexport function get () { return c; }"),
    ])
    .await
    .unwrap();
    let code = es6(&bundle);
    assert!(code.starts_with("import { c as c$1 } from 'ext';"));
    assert!(code.contains("var c = 2;"));
    assert!(code.contains("function get () { return c; }"));
    assert!(code.contains("console.log(c$1, get());"));

    let cjs = bundle.generate(&GenerateOptions::new(Format::Cjs)).unwrap().code;
    assert!(cjs.contains("console.log(ext.c, get());"));
}

#[tokio::test]
async fn test_wrapper_names_are_never_reused() {
    let bundle = build(&[("/main.js", "var module = { id: 1 };\nconsole.log(module.id);")])
        .await
        .unwrap();
    let code = bundle.generate(&GenerateOptions::new(Format::Cjs)).unwrap().code;
    assert!(!code.contains("var module ="));
    assert!(code.contains("var module$1 = { id: 1 };"));
    assert!(code.contains("console.log(module$1.id);"));
}

#[tokio::test]
async fn test_named_cjs_without_exports() {
    let bundle = build(&[
        ("/main.js", "import { a } from './m';\nconsole.log(a);"),
        ("/m.js", "export const a = 1;\nexport const b = 2;"),
    ])
    .await
    .unwrap();
    let mut options = GenerateOptions::new(Format::Cjs);
    options.exports = ExportModeOption::Named;
    let code = bundle.generate(&options).unwrap().code;
    assert!(code.starts_with("'use strict';"));
    assert!(code.contains("const a = 1;"));
    assert!(code.contains("console.log(a);"));
    assert!(!code.contains("b = 2"));
    assert!(!code.contains("require("));
    assert!(!code.contains("exports"));
    assert!(bundle.imports().is_empty());
}

#[tokio::test]
async fn test_source_map_points_at_original_positions() {
    let main = "import { a } from './m';\nconsole.log(a);";
    let m = "export const a = 1;\nexport const b = 2;";
    let bundle = build(&[("/main.js", main), ("/m.js", m)]).await.unwrap();

    let mut options = GenerateOptions::new(Format::Es6);
    options.sourcemap = SourceMapOption::File;
    let output = bundle.generate(&options).unwrap();
    let map = output.map.unwrap();
    let lines = map.decoded().unwrap();
    let source_index = |suffix: &str| {
        map.sources
            .iter()
            .position(|source| source.as_deref().is_some_and(|s| s.ends_with(suffix)))
            .unwrap() as u32
    };

    for (needle, source, module_code, suffix) in [
        ("const a = 1;", m, m, "m.js"),
        ("console.log(a);", main, main, "main.js"),
    ] {
        let generated_line = output.code.lines().position(|line| line == needle).unwrap();
        let segment = lines[generated_line][0];
        assert_eq!(segment.generated_column, 0);
        assert_eq!(segment.source_index, source_index(suffix));

        let expected = SourceLocation::from_offset(module_code, source.find(needle).unwrap());
        assert_eq!(segment.source_line as usize + 1, expected.line);
        assert_eq!(segment.source_column as usize, expected.column);
    }
    assert_eq!(map.sources_content.len(), map.sources.len());
}

#[tokio::test]
async fn test_source_map_columns_after_non_ascii() {
    let main = "var é = 'ü'; console.log(é);";
    let bundle = build(&[("/main.js", main)]).await.unwrap();

    let mut options = GenerateOptions::new(Format::Es6);
    options.sourcemap = SourceMapOption::File;
    let output = bundle.generate(&options).unwrap();
    assert_eq!(output.code, main);
    let lines = output.map.unwrap().decoded().unwrap();
    let console = lines[0].iter().find(|segment| segment.generated_column == 13).unwrap();
    assert_eq!((console.source_line, console.source_column), (0, 13));
    assert!(lines[0].iter().all(|segment| segment.generated_column < 28));
}

/// Puts an unused declaration on a line of its own above every module.
struct PadTop;

#[async_trait]
impl Transform for PadTop {
    async fn transform(&self, code: &str, _id: &str) -> shakepack::Result<Option<SourceDescription>> {
        let mut magic = MagicString::new(code);
        magic.prepend("var pad = 0;\n");
        let map = magic.generate_map(&MapOptions {
            hires: true,
            ..MapOptions::default()
        });
        Ok(Some(SourceDescription {
            code: magic.to_string(),
            map: Some(map),
        }))
    }
}

#[tokio::test]
async fn test_source_map_traces_through_transforms() {
    let main = "import { a } from './m';\nconsole.log(a);";
    let m = "export const a = 1;\nexport const b = 2;";
    let memory = Arc::new(Memory([("/main.js", main), ("/m.js", m)].into_iter().collect()));
    let bundle = Bundle::build(
        BundleOptions::new("main")
            .loader(memory.clone())
            .resolver(memory)
            .transform(Arc::new(PadTop)),
    )
    .await
    .unwrap();

    let mut options = GenerateOptions::new(Format::Es6);
    options.sourcemap = SourceMapOption::File;
    let output = bundle.generate(&options).unwrap();
    assert!(!output.code.contains("pad"));
    let map = output.map.unwrap();
    let lines = map.decoded().unwrap();

    for (needle, module_code) in [("const a = 1;", m), ("console.log(a);", main)] {
        let generated_line = output.code.lines().position(|line| line == needle).unwrap();
        let segment = lines[generated_line][0];
        let expected = SourceLocation::from_offset(module_code, module_code.find(needle).unwrap());
        assert_eq!(segment.source_line as usize + 1, expected.line);
        assert_eq!(segment.source_column as usize, expected.column);
    }
    let contents: Vec<&str> = map.sources_content.iter().flatten().map(String::as_str).collect();
    assert!(contents.contains(&main));
    assert!(contents.contains(&m));
}

#[tokio::test]
async fn test_missing_export_names_both_modules() {
    let err = build(&[
        ("/main.js", "import { nope } from './m';\nconsole.log(nope);"),
        ("/m.js", "export var yes = 1;"),
    ])
    .await
    .unwrap_err();
    assert_eq!(err.code(), "MISSING_EXPORT");
    let message = err.to_string();
    assert!(message.contains("nope"));
    assert!(message.contains("/m.js"));
    assert!(message.contains("/main.js"));
}

#[tokio::test]
async fn test_generate_is_repeatable() {
    let bundle = build(&[
        ("/main.js", "import { helper } from './util';\nexport default function () { return helper(); }"),
        ("/util.js", "export function helper () { return 1; }"),
    ])
    .await
    .unwrap();
    let first = es6(&bundle);
    let mut options = GenerateOptions::new(Format::Umd);
    options.module_name = Some("app".into());
    bundle.generate(&options).unwrap();
    assert_eq!(es6(&bundle), first);
}
