use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::core::FacturXError;

macro_rules! embedded {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../../resources/", $path)))),*]
    };
}

const EMBEDDED: &[(&str, &str)] = embedded![
    "templates/factur-x/minimum.xml",
    "templates/factur-x/basicwl.xml",
    "templates/factur-x/basic.xml",
    "templates/factur-x/en16931.xml",
    "templates/factur-x/extended.xml",
    "templates/zugferd/basic.xml",
    "templates/zugferd/comfort.xml",
    "templates/zugferd/extended.xml",
    "schemas/factur-x/minimum.yml",
    "schemas/factur-x/basicwl.yml",
    "schemas/factur-x/basic.yml",
    "schemas/factur-x/en16931.yml",
    "schemas/factur-x/extended.yml",
    "schemas/zugferd/basic.yml",
    "schemas/zugferd/comfort.yml",
    "schemas/zugferd/extended.yml",
    "xmp/factur-x.xmp",
    "xmp/zugferd.xmp",
];

/// Where templates, schemas and XMP extension descriptions are read from.
///
/// Paths are relative to the `resources/` layout, e.g.
/// `templates/factur-x/minimum.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Resources {
    /// Files compiled into the crate.
    #[default]
    Embedded,
    /// A directory with the same layout, for custom templates and schemas.
    Directory(PathBuf),
}

impl Resources {
    pub fn embedded() -> Self {
        Self::Embedded
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::Directory(dir.as_ref().to_path_buf())
    }

    /// Read a resource; `Ok(None)` when it does not exist.
    pub fn load(&self, relative: &str) -> Result<Option<Cow<'static, str>>, FacturXError> {
        match self {
            Self::Embedded => Ok(EMBEDDED
                .iter()
                .find(|(path, _)| *path == relative)
                .map(|(_, content)| Cow::Borrowed(*content))),
            Self::Directory(dir) => {
                let path = dir.join(relative);
                if !path.is_file() {
                    return Ok(None);
                }
                Ok(Some(Cow::Owned(std::fs::read_to_string(path)?)))
            }
        }
    }

    /// Like [`load`](Self::load), mapping absence to [`FacturXError::TemplateMissing`].
    pub fn require(
        &self,
        relative: &str,
        flavor: &str,
        level: &str,
    ) -> Result<Cow<'static, str>, FacturXError> {
        self.load(relative)?.ok_or_else(|| {
            tracing::error!(resource = relative, flavor, level, "resource not found");
            FacturXError::TemplateMissing {
                flavor: flavor.to_string(),
                level: level.to_string(),
            }
        })
    }
}
