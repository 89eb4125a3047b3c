//! Module resolution and loading.
//!
//! Every VM owns one [`ModuleRegistry`], installed as an extension of its
//! [`EvalContext`]. `require(specifier)` resolves in this order, first hit
//! wins:
//!
//! 1. a registered native module (its factory runs once per VM),
//! 2. an absolute URL, fetched through the [`SourceLoader`],
//! 3. a path relative to the caller's directory: with a known extension,
//!    then with each of `.js`, `.ts`, `.json`, `.yaml`, `.yml` appended,
//!    then as a directory (`package.json` `main`, `index.js`, `index.ts`,
//!    `index.json`),
//! 4. `node_modules/<specifier>` in the caller's directory and each parent.
//!
//! Results are cached per `(caller directory, specifier)` and per resolved
//! path, so requiring the same module twice yields the identical exports.
//! Compiled programs are shared process-wide through [`compile`].

pub mod compile;
pub mod typescript;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::event_loop::RuntimeError;
use crate::parser::ast::ProgramData;
use crate::parser::CompileError;
use crate::runner::ds::error::JErrorType;
use crate::runner::ds::json::json_to_js;
use crate::runner::ds::object::object_value;
use crate::runner::ds::object_property::PropertyMap;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::closure_value;
use crate::runner::eval::property::get_property;
use crate::runner::eval::run_module;
use crate::runner::eval::types::ValueResult;
use crate::runner::plugin::types::EvalContext;
use crate::runner::std_lib::arg;
use crate::runner::std_lib::error::create_error;
use crate::runner::ds::operations::type_conversion::to_string;

/// Extensions tried, in order, for a specifier without one.
pub const EXTENSIONS: &[&str] = &["js", "ts", "json", "yaml", "yml"];

const INDEX_FILES: &[&str] = &["index.js", "index.ts", "index.json"];

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module {specifier} not found: require() from {caller}")]
    NotFound { specifier: String, caller: String },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("cannot parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot fetch {url}: {message}")]
    Fetch { url: String, message: String },
}

impl From<ModuleError> for JErrorType {
    fn from(e: ModuleError) -> Self {
        match e {
            ModuleError::Compile(c) => {
                JErrorType::SyntaxError(format!("{} ({}:{}:{})", c.message, c.file, c.line, c.column))
            }
            other => JErrorType::Thrown(create_error("Error", &other.to_string())),
        }
    }
}

/// Where module sources come from.
pub trait SourceLoader {
    fn read(&self, path: &Path) -> io::Result<String>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Fetches the source behind an absolute URL.
    fn fetch(&self, url: &str) -> Result<String, String>;
}

/// Reads modules from the local file system and fetches URLs over HTTP.
#[derive(Debug, Clone)]
pub struct FsLoader {
    pub fetch_timeout: Duration,
}

impl Default for FsLoader {
    fn default() -> Self {
        FsLoader {
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl SourceLoader for FsLoader {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn fetch(&self, url: &str) -> Result<String, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(|e| e.to_string())?;
        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        response.text().map_err(|e| e.to_string())
    }
}

/// Factory of a native module's exports.
pub type NativeFactory = Rc<dyn Fn(&mut EvalContext) -> ValueResult>;

#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    File(PathBuf),
    Url(String),
}

impl Resolved {
    fn key(&self) -> String {
        match self {
            Resolved::File(p) => p.to_string_lossy().into_owned(),
            Resolved::Url(u) => u.clone(),
        }
    }

    fn extension(&self) -> Option<String> {
        let name = match self {
            Resolved::File(p) => p.to_string_lossy().into_owned(),
            Resolved::Url(u) => u.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Directory relative requires inside this module resolve against. For
    /// a URL module this is the URL up to the last `/` of its path.
    fn dir(&self) -> PathBuf {
        match self {
            Resolved::File(p) => p.parent().map(Path::to_path_buf).unwrap_or_default(),
            Resolved::Url(u) => PathBuf::from(url_dir(u)),
        }
    }
}

enum LoadError {
    Module(ModuleError),
    Script(JErrorType),
}

impl From<ModuleError> for LoadError {
    fn from(e: ModuleError) -> Self {
        LoadError::Module(e)
    }
}

impl From<JErrorType> for LoadError {
    fn from(e: JErrorType) -> Self {
        LoadError::Script(e)
    }
}

impl From<LoadError> for JErrorType {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Module(m) => m.into(),
            LoadError::Script(s) => s,
        }
    }
}

impl From<LoadError> for RuntimeError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Module(m) => RuntimeError::Module(m),
            LoadError::Script(s) => s.into(),
        }
    }
}

pub struct ModuleRegistry {
    loader: Rc<dyn SourceLoader>,
    natives: RefCell<HashMap<String, NativeFactory>>,
    native_exports: RefCell<HashMap<String, JsValue>>,
    by_request: RefCell<HashMap<(PathBuf, String), JsValue>>,
    by_path: RefCell<HashMap<String, JsValue>>,
}

impl ModuleRegistry {
    pub fn new(loader: Rc<dyn SourceLoader>) -> Self {
        ModuleRegistry {
            loader,
            natives: RefCell::new(HashMap::new()),
            native_exports: RefCell::new(HashMap::new()),
            by_request: RefCell::new(HashMap::new()),
            by_path: RefCell::new(HashMap::new()),
        }
    }

    /// Creates a registry and attaches it to `ctx`.
    pub fn install(ctx: &mut EvalContext, loader: Rc<dyn SourceLoader>) -> Rc<ModuleRegistry> {
        let registry = Rc::new(ModuleRegistry::new(loader));
        ctx.set_extension(registry.clone());
        registry
    }

    /// The registry attached to `ctx`.
    pub fn of(ctx: &EvalContext) -> Result<Rc<ModuleRegistry>, JErrorType> {
        ctx.extension::<ModuleRegistry>()
            .ok_or_else(|| JErrorType::ReferenceError("require is not available".to_string()))
    }

    pub fn register_native<F>(&self, name: &str, factory: F)
    where
        F: Fn(&mut EvalContext) -> ValueResult + 'static,
    {
        self.natives.borrow_mut().insert(name.to_string(), Rc::new(factory));
    }

    pub fn is_native(&self, name: &str) -> bool {
        self.natives.borrow().contains_key(name)
    }

    /// Resolves and loads `specifier` as seen from `caller_dir`.
    pub fn require(&self, ctx: &mut EvalContext, caller_dir: &Path, specifier: &str) -> ValueResult {
        self.load(ctx, caller_dir, specifier).map_err(JErrorType::from)
    }

    /// Runs the entry script at `path` as a module and returns its exports.
    pub fn run_main(&self, ctx: &mut EvalContext, path: &Path) -> Result<JsValue, RuntimeError> {
        let resolved = Resolved::File(normalize(path));
        Ok(self.load_resolved(ctx, &resolved)?)
    }

    /// Runs `source` as a module named `name` whose relative requires
    /// resolve against `dir`. Nothing is cached under `name`.
    pub fn run_source(
        &self,
        ctx: &mut EvalContext,
        name: &str,
        dir: &Path,
        source: &str,
    ) -> Result<JsValue, RuntimeError> {
        let program = compile::compile(name, source)?;
        let exports = evaluate(ctx, &program, name, dir.to_path_buf())?;
        Ok(exports)
    }

    fn load(&self, ctx: &mut EvalContext, caller_dir: &Path, specifier: &str) -> Result<JsValue, LoadError> {
        if let Some(exports) = self.native(ctx, specifier)? {
            return Ok(exports);
        }
        let request = (caller_dir.to_path_buf(), specifier.to_string());
        if let Some(exports) = self.by_request.borrow().get(&request) {
            return Ok(exports.clone());
        }
        let resolved = self.resolve(caller_dir, specifier)?;
        log::debug!("require({}) from {} -> {}", specifier, caller_dir.display(), resolved.key());
        let exports = self.load_resolved(ctx, &resolved)?;
        self.by_request.borrow_mut().insert(request, exports.clone());
        Ok(exports)
    }

    fn native(&self, ctx: &mut EvalContext, name: &str) -> Result<Option<JsValue>, JErrorType> {
        if let Some(exports) = self.native_exports.borrow().get(name) {
            return Ok(Some(exports.clone()));
        }
        let factory = match self.natives.borrow().get(name) {
            Some(f) => f.clone(),
            None => return Ok(None),
        };
        let exports = factory(ctx)?;
        self.native_exports.borrow_mut().insert(name.to_string(), exports.clone());
        Ok(Some(exports))
    }

    fn load_resolved(&self, ctx: &mut EvalContext, resolved: &Resolved) -> Result<JsValue, LoadError> {
        let key = resolved.key();
        if let Some(exports) = self.by_path.borrow().get(&key) {
            return Ok(exports.clone());
        }
        let source = match resolved {
            Resolved::File(path) => self.loader.read(path).map_err(|source| ModuleError::Io {
                path: key.clone(),
                source,
            })?,
            Resolved::Url(url) => self.loader.fetch(url).map_err(|message| ModuleError::Fetch {
                url: url.clone(),
                message,
            })?,
        };
        let exports = match resolved.extension().as_deref() {
            Some("json") => {
                let value: Value = serde_json::from_str(&source).map_err(|e| ModuleError::Parse {
                    path: key.clone(),
                    message: e.to_string(),
                })?;
                json_to_js(&value)
            }
            Some("yaml") | Some("yml") => {
                let value: Value = serde_yaml::from_str(&source).map_err(|e| ModuleError::Parse {
                    path: key.clone(),
                    message: e.to_string(),
                })?;
                json_to_js(&value)
            }
            _ => {
                let program = compile::compile(&key, &source).map_err(ModuleError::from)?;
                let placeholder = object_value(PropertyMap::new());
                // Cyclic requires see the exports object as it is so far.
                self.by_path.borrow_mut().insert(key.clone(), placeholder.clone());
                match evaluate_with(ctx, &program, &key, resolved.dir(), placeholder) {
                    Ok(exports) => exports,
                    Err(e) => {
                        self.by_path.borrow_mut().remove(&key);
                        return Err(e.into());
                    }
                }
            }
        };
        self.by_path.borrow_mut().insert(key, exports.clone());
        Ok(exports)
    }

    fn resolve(&self, caller_dir: &Path, specifier: &str) -> Result<Resolved, ModuleError> {
        if is_url(specifier) {
            return Ok(Resolved::Url(specifier.to_string()));
        }
        let base = caller_dir.to_string_lossy();
        if is_url(&base) {
            if specifier.starts_with('.') || specifier.starts_with('/') {
                return Ok(Resolved::Url(join_url(&base, specifier)));
            }
            return Err(ModuleError::NotFound {
                specifier: specifier.to_string(),
                caller: base.into_owned(),
            });
        }
        if let Some(path) = self.resolve_path(&caller_dir.join(specifier)) {
            return Ok(Resolved::File(path));
        }
        let bare = !(specifier.starts_with('.') || Path::new(specifier).is_absolute());
        if bare {
            let mut dir = Some(caller_dir);
            while let Some(d) = dir {
                let candidate = d.join("node_modules").join(specifier);
                if let Some(path) = self.resolve_path(&candidate) {
                    return Ok(Resolved::File(path));
                }
                dir = d.parent();
            }
        }
        Err(ModuleError::NotFound {
            specifier: specifier.to_string(),
            caller: caller_dir.display().to_string(),
        })
    }

    fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        let path = normalize(path);
        self.resolve_file(&path).or_else(|| self.resolve_dir(&path))
    }

    fn resolve_file(&self, path: &Path) -> Option<PathBuf> {
        let known = path
            .extension()
            .map(|e| EXTENSIONS.contains(&e.to_string_lossy().to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if known && self.loader.is_file(path) {
            return Some(path.to_path_buf());
        }
        EXTENSIONS.iter().find_map(|ext| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            self.loader.is_file(&candidate).then_some(candidate)
        })
    }

    fn resolve_dir(&self, path: &Path) -> Option<PathBuf> {
        if !self.loader.is_dir(path) {
            return None;
        }
        let manifest = path.join("package.json");
        if self.loader.is_file(&manifest) {
            let main = self
                .loader
                .read(&manifest)
                .ok()
                .and_then(|text| serde_json::from_str::<Value>(&text).ok())
                .and_then(|v| v.get("main").and_then(Value::as_str).map(str::to_string));
            if let Some(main) = main {
                let target = normalize(&path.join(main));
                if self.loader.is_file(&target) {
                    return Some(target);
                }
                if let Some(found) = self.resolve_file(&target) {
                    return Some(found);
                }
            }
        }
        INDEX_FILES
            .iter()
            .map(|index| path.join(index))
            .find(|candidate| self.loader.is_file(candidate))
    }
}

/// The `require` function handed to code whose relative requires resolve
/// against `dir`.
pub fn require_function(dir: PathBuf) -> JsValue {
    closure_value("require", move |ctx, _this, args| {
        let specifier = to_string(&arg(&args, 0));
        let registry = ModuleRegistry::of(ctx)?;
        registry.require(ctx, &dir, &specifier)
    })
}

fn evaluate(ctx: &mut EvalContext, program: &ProgramData, name: &str, dir: PathBuf) -> ValueResult {
    evaluate_with(ctx, program, name, dir, object_value(PropertyMap::new()))
}

/// Runs `program` with `exports`, `module` and `require` in scope and
/// returns the final `module.exports`.
fn evaluate_with(
    ctx: &mut EvalContext,
    program: &ProgramData,
    name: &str,
    dir: PathBuf,
    exports: JsValue,
) -> ValueResult {
    let mut properties = PropertyMap::new();
    properties.insert("exports", exports.clone());
    properties.insert("id", JsValue::str(name));
    let module = object_value(properties);
    let dirname = JsValue::str(dir.to_string_lossy());
    let bindings = vec![
        ("exports", exports.clone()),
        ("module", module.clone()),
        ("require", require_function(dir)),
        ("__filename", JsValue::str(name)),
        ("__dirname", dirname),
    ];
    run_module(program, ctx, bindings, exports)?;
    get_property(ctx, &module, "exports")
}

/// Offset where the path of `url` starts, after `scheme://host`.
fn url_path_start(url: &str) -> usize {
    url.find("://")
        .map(|i| i + 3)
        .and_then(|i| url[i..].find('/').map(|j| i + j))
        .unwrap_or(url.len())
}

fn url_dir(url: &str) -> String {
    let url = url.split(['?', '#']).next().unwrap_or_default();
    let start = url_path_start(url);
    match url[start..].rfind('/') {
        Some(last) => url[..=start + last].to_string(),
        None => format!("{}/", url),
    }
}

/// `specifier` (relative or root-relative) applied to the directory URL `base`.
fn join_url(base: &str, specifier: &str) -> String {
    let (origin, dir) = base.split_at(url_path_start(base));
    let joined = if specifier.starts_with('/') {
        specifier.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, specifier)
    } else {
        format!("{}/{}", dir, specifier)
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/').skip(1) {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("{}/{}", origin, segments.join("/"))
}

fn is_url(specifier: &str) -> bool {
    match specifier.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}

/// Lexically removes `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.js")), PathBuf::from("/a/c/d.js"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn recognizes_urls() {
        assert!(is_url("https://example.com/mod.js"));
        assert!(is_url("file://tmp/x.js"));
        assert!(!is_url("./mod"));
        assert!(!is_url("lodash"));
    }

    #[test]
    fn url_extension_ignores_query() {
        let r = Resolved::Url("http://h/data.json?v=1".to_string());
        assert_eq!(r.extension().as_deref(), Some("json"));
    }

    #[derive(Default)]
    struct Remote {
        fetched: RefCell<Vec<String>>,
    }

    impl SourceLoader for Remote {
        fn read(&self, path: &Path) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
        }

        fn is_file(&self, _path: &Path) -> bool {
            false
        }

        fn is_dir(&self, _path: &Path) -> bool {
            false
        }

        fn fetch(&self, url: &str) -> Result<String, String> {
            self.fetched.borrow_mut().push(url.to_string());
            Ok(r#"{"a": 1}"#.to_string())
        }
    }

    #[test]
    fn url_modules_resolve_relative_requires_against_their_url() {
        let module = Resolved::Url("http://h/lib/util/a.js?v=2".to_string());
        let dir = module.dir();
        assert_eq!(dir, PathBuf::from("http://h/lib/util/"));

        let registry = ModuleRegistry::new(Rc::new(Remote::default()));
        let resolve = |spec: &str| registry.resolve(&dir, spec).unwrap();
        assert_eq!(resolve("./b.js"), Resolved::Url("http://h/lib/util/b.js".to_string()));
        assert_eq!(resolve("../c.js"), Resolved::Url("http://h/lib/c.js".to_string()));
        assert_eq!(resolve("/root.js"), Resolved::Url("http://h/root.js".to_string()));
        assert!(registry.resolve(&dir, "lodash").is_err());
    }

    #[test]
    fn url_without_path_has_root_dir() {
        assert_eq!(Resolved::Url("https://h".to_string()).dir(), PathBuf::from("https://h/"));
        assert_eq!(join_url("https://h/", "./x.js"), "https://h/x.js");
    }

    #[test]
    fn relative_require_inside_url_module_is_fetched() {
        let remote = Rc::new(Remote::default());
        let registry = ModuleRegistry::new(remote.clone());
        let mut ctx = EvalContext::with_core_builtins();
        let dir = Resolved::Url("http://h/lib/a.js".to_string()).dir();
        assert!(registry.require(&mut ctx, &dir, "./data.json").is_ok());
        assert_eq!(*remote.fetched.borrow(), vec!["http://h/lib/data.json".to_string()]);
    }

    #[test]
    fn module_errors_become_script_errors() {
        let e: JErrorType = ModuleError::NotFound {
            specifier: "./x".into(),
            caller: "/tmp".into(),
        }
        .into();
        assert!(e.get_message().contains("module ./x not found: require() from /tmp"));
    }
}
