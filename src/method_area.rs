//! The method area holds every class loaded by the runtime, keyed by
//! qualified name. Classes are loaded on first reference and shared
//! afterwards; they are never unloaded.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::class::StaticClass;
use crate::error::{Result, RuntimeError};
use crate::jvm::{read_class_file, JVMParser};

/// Produces class metadata from a qualified name such as `java/lang/Object`.
pub trait ClassLoader {
    fn load(&self, name: &str) -> Result<StaticClass>;
}

/// Loads `<root>/<name>.class` from the first root that has it.
#[derive(Debug, Clone)]
pub struct ClassPathLoader {
    roots: Vec<PathBuf>,
}

impl ClassPathLoader {
    pub fn new<P: AsRef<Path>>(roots: impl IntoIterator<Item = P>) -> Self {
        Self {
            roots: roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }
}

impl ClassLoader for ClassPathLoader {
    fn load(&self, name: &str) -> Result<StaticClass> {
        for root in &self.roots {
            let path = root.join(format!("{name}.class"));
            if path.is_file() {
                let bytes = read_class_file(&path)?;
                return StaticClass::new(JVMParser::parse(&bytes)?);
            }
        }
        Err(RuntimeError::ClassNotFound {
            name: name.to_string(),
        })
    }
}

/// Serves class files registered in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    classes: HashMap<String, Vec<u8>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the bytes of a class file under `name`.
    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.classes.insert(normalize(name), bytes);
    }
}

impl ClassLoader for InMemoryLoader {
    fn load(&self, name: &str) -> Result<StaticClass> {
        let bytes = self
            .classes
            .get(name)
            .ok_or_else(|| RuntimeError::ClassNotFound {
                name: name.to_string(),
            })?;
        StaticClass::new(JVMParser::parse(bytes)?)
    }
}

/// Registry of loaded classes.
pub struct MethodArea {
    loader: Box<dyn ClassLoader>,
    classes: HashMap<String, Rc<StaticClass>>,
}

impl MethodArea {
    pub fn new(loader: impl ClassLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            classes: HashMap::new(),
        }
    }

    /// Returns the class named `name`, loading it first if needed.
    ///
    /// The name may use `.` or `/` as separator and may end in `.class`.
    pub fn load_class(&mut self, name: &str) -> Result<Rc<StaticClass>> {
        let name = normalize(name);
        if let Some(class) = self.classes.get(&name) {
            return Ok(Rc::clone(class));
        }

        let class = Rc::new(self.loader.load(&name)?);
        if class.name() != name {
            return Err(RuntimeError::class_format(format!(
                "expected class {name}, class file declares {}",
                class.name()
            )));
        }
        debug!(class = %name, "loaded class");
        self.classes.insert(name, Rc::clone(&class));
        Ok(class)
    }

    /// Returns an already loaded class without triggering a load.
    pub fn get_class(&self, name: &str) -> Option<Rc<StaticClass>> {
        self.classes.get(&normalize(name)).cloned()
    }

    /// Registers a class built outside the loader. Returns `false` and keeps
    /// the existing entry if a class with the same name is present.
    pub fn add_class(&mut self, class: StaticClass) -> bool {
        if self.classes.contains_key(class.name()) {
            return false;
        }
        self.classes
            .insert(class.name().to_string(), Rc::new(class));
        true
    }

    /// Number of loaded classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.strip_suffix(".class").unwrap_or(name).replace('.', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeErrorKind;
    use crate::testing::ClassBuilder;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    struct CountingLoader {
        inner: InMemoryLoader,
        loads: Rc<Cell<usize>>,
    }

    impl ClassLoader for CountingLoader {
        fn load(&self, name: &str) -> Result<StaticClass> {
            self.loads.set(self.loads.get() + 1);
            self.inner.load(name)
        }
    }

    #[test]
    fn loads_once_and_caches() {
        let mut inner = InMemoryLoader::new();
        inner.insert("demo/Point", ClassBuilder::new("demo/Point").build());
        let loads = Rc::new(Cell::new(0));
        let mut area = MethodArea::new(CountingLoader {
            inner,
            loads: Rc::clone(&loads),
        });

        assert!(area.get_class("demo/Point").is_none());
        let first = area.load_class("demo/Point").unwrap();
        let second = area.load_class("demo.Point.class").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 1);
        assert_eq!(area.len(), 1);
        assert!(area.get_class("demo/Point").is_some());
    }

    #[test]
    fn missing_class_is_a_missing_member() {
        let mut area = MethodArea::new(InMemoryLoader::new());
        let err = area.load_class("demo/Nowhere").unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::MissingMember);
        assert!(area.is_empty());
    }

    #[test]
    fn rejects_class_stored_under_another_name() {
        let mut loader = InMemoryLoader::new();
        loader.insert("demo/A", ClassBuilder::new("demo/B").build());
        let mut area = MethodArea::new(loader);
        let err = area.load_class("demo/A").unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::ClassFormat);
    }

    #[test]
    fn add_class_keeps_the_first_entry() {
        let mut area = MethodArea::new(InMemoryLoader::new());
        assert!(area.add_class(ClassBuilder::new("demo/Point").static_class()));
        assert!(!area.add_class(
            ClassBuilder::new("demo/Point")
                .field(0, "x", "I")
                .static_class()
        ));
        let class = area.load_class("demo/Point").unwrap();
        assert!(class.fields().is_empty());
    }

    #[test]
    fn class_path_loader_reports_missing_files() {
        let loader = ClassPathLoader::new([std::env::temp_dir().join("brewvm-no-such-dir")]);
        let err = loader.load("demo/Point").unwrap_err();
        assert_eq!(err.kind(), RuntimeErrorKind::MissingMember);
    }

    #[test]
    fn class_path_loader_searches_every_root() {
        let empty = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("demo")).unwrap();
        fs::write(
            root.path().join("demo/Point.class"),
            ClassBuilder::new("demo/Point").field(0, "x", "I").build(),
        )
        .unwrap();

        let mut area = MethodArea::new(ClassPathLoader::new([empty.path(), root.path()]));
        let class = area.load_class("demo.Point").unwrap();
        assert_eq!(class.name(), "demo/Point");
        assert_eq!(class.fields().len(), 1);
        assert!(area.get_class("demo/Point").is_some());
    }
}
