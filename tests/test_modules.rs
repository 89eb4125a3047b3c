//! Tests for module resolution and loading through a script runtime.

extern crate mokapi_engine;

use std::fs;
use std::path::Path;

use mokapi_engine::config::RuntimeConfig;
use mokapi_engine::event_loop::RuntimeError;
use mokapi_engine::runtime::ScriptRuntime;
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn runtime(dir: &TempDir) -> ScriptRuntime {
    let config = RuntimeConfig::default()
        .with_script_name("main.js")
        .with_working_dir(dir.path());
    let (runtime, _host) = ScriptRuntime::with_default_host(config).unwrap();
    runtime
}

// ============================================================================
// Resolution
// ============================================================================

mod resolution_tests {
    use super::*;

    #[test]
    fn test_require_twice_yields_same_exports() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "mod.js", "export default { foo: 'bar' }");
        write(
            dir.path(),
            "main.js",
            "const a = require('./mod')\n\
             const b = require('./mod')\n\
             export default function () { return { same: a === b, mod: a } }",
        );
        let result = runtime(&dir).run_main(Path::new("main.js")).unwrap();
        assert_eq!(result, json!({"same": true, "mod": {"default": {"foo": "bar"}}}));
    }

    #[test]
    fn test_extension_order_and_index_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "data.json", r#"{"kind": "json"}"#);
        write(dir.path(), "lib/index.js", "module.exports = { kind: 'index' }");
        write(dir.path(), "conf.yaml", "kind: yaml\n");
        write(
            dir.path(),
            "main.js",
            "export default function () {\n\
                 return [require('./data').kind, require('./lib').kind, require('./conf').kind]\n\
             }",
        );
        let result = runtime(&dir).run_main(Path::new("main.js")).unwrap();
        assert_eq!(result, json!(["json", "index", "yaml"]));
    }

    #[test]
    fn test_package_main_and_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/greet/package.json", r#"{"main": "lib/greet.js"}"#);
        write(
            dir.path(),
            "node_modules/greet/lib/greet.js",
            "exports.hello = name => 'hello ' + name",
        );
        write(
            dir.path(),
            "scripts/main.js",
            "import { hello } from 'greet'\nexport default function () { return hello('mokapi') }",
        );
        let result = runtime(&dir).run_main(Path::new("scripts/main.js")).unwrap();
        assert_eq!(result, json!("hello mokapi"));
    }

    #[test]
    fn test_missing_module() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.js", "require('./nope')");
        let err = runtime(&dir).run_main(Path::new("main.js")).unwrap_err();
        assert!(err.to_string().contains("module ./nope not found"), "{}", err);
    }

    #[test]
    fn test_native_modules_are_shared() {
        let dir = tempfile::tempdir().unwrap();
        let result = runtime(&dir)
            .run_source(
                "inline.js",
                "const a = require('mokapi')\nexport default function () { return a === require('mokapi') }",
            )
            .unwrap();
        assert_eq!(result, json!(true));
    }
}

// ============================================================================
// Module semantics
// ============================================================================

mod semantics_tests {
    use super::*;

    #[test]
    fn test_import_forms() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "lib.js",
            "export const one = 1\nexport function two() { return 2 }\nexport default 'three'",
        );
        write(
            dir.path(),
            "main.js",
            "import three, { one, two as second } from './lib'\n\
             import * as all from './lib'\n\
             export default function () { return [one, second(), three, all.one] }",
        );
        let result = runtime(&dir).run_main(Path::new("main.js")).unwrap();
        assert_eq!(result, json!([1, 2, "three", 1]));
    }

    #[test]
    fn test_typescript_annotations_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "util.ts",
            "interface Pet { name: string }\n\
             export function label(pet: Pet): string { return `pet ${pet.name}` }",
        );
        write(
            dir.path(),
            "main.js",
            "import { label } from './util'\nexport default function () { return label({ name: 'Rex' }) }",
        );
        let result = runtime(&dir).run_main(Path::new("main.js")).unwrap();
        assert_eq!(result, json!("pet Rex"));
    }

    #[test]
    fn test_cyclic_require_sees_partial_exports() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.js", "exports.early = 'a'\nconst b = require('./b')\nexports.fromB = b.seen");
        write(dir.path(), "b.js", "exports.seen = require('./a').early");
        write(
            dir.path(),
            "main.js",
            "export default function () { return require('./a').fromB }",
        );
        let result = runtime(&dir).run_main(Path::new("main.js")).unwrap();
        assert_eq!(result, json!("a"));
    }

    #[test]
    fn test_async_default_export_is_awaited() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "main.js",
            "import { sleep } from 'mokapi'\n\
             export default async function () { await sleep(10); return 'slept' }",
        );
        let result = runtime(&dir).run_main(Path::new("main.js")).unwrap();
        assert_eq!(result, json!("slept"));
    }

    #[test]
    fn test_compile_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.js", "export default {");
        write(dir.path(), "main.js", "require('./broken')");
        let err = runtime(&dir).run_main(Path::new("main.js")).unwrap_err();
        match err {
            RuntimeError::Script { name, message } => {
                assert_eq!(name, "SyntaxError");
                assert!(message.contains("broken.js"), "{}", message);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
