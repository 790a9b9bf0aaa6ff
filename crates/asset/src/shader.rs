//! Shader source files, read whole and handed to the compiler verbatim.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{AssetError, AssetResult};

/// A vertex/fragment source pair plus where it came from (for diagnostics).
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
    pub vertex_label: String,
    pub fragment_label: String,
}

impl ShaderSources {
    pub fn load(vertex_path: impl AsRef<Path>, fragment_path: impl AsRef<Path>) -> AssetResult<Self> {
        let (vertex, vertex_path) = read_source(vertex_path.as_ref())?;
        let (fragment, fragment_path) = read_source(fragment_path.as_ref())?;
        Ok(Self {
            vertex,
            fragment,
            vertex_label: vertex_path.display().to_string(),
            fragment_label: fragment_path.display().to_string(),
        })
    }
}

fn read_source(path: &Path) -> AssetResult<(String, PathBuf)> {
    match fs::read_to_string(path) {
        Ok(src) => {
            log::info!("Read shader source {} ({} bytes)", path.display(), src.len());
            Ok((src, path.to_path_buf()))
        }
        Err(e) => {
            log::error!("Could not open shader {}", path.display());
            Err(AssetError::not_found(path, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_both_stages() {
        let mut vs = tempfile::NamedTempFile::new().expect("tempfile");
        let mut frag = tempfile::NamedTempFile::new().expect("tempfile");
        vs.write_all(b"#version 450\nvoid main() {}\n").expect("write");
        frag.write_all(b"#version 450\nvoid main() { }\n").expect("write");

        let sources = ShaderSources::load(vs.path(), frag.path()).expect("load");
        assert!(sources.vertex.ends_with("{}\n"));
        assert!(sources.fragment.ends_with("{ }\n"));
        assert_eq!(sources.vertex_label, vs.path().display().to_string());
    }

    #[test]
    fn missing_fragment_is_not_found() {
        let vs = tempfile::NamedTempFile::new().expect("tempfile");
        let err = ShaderSources::load(vs.path(), "/no/such/shader.frag").unwrap_err();
        match err {
            AssetError::ResourceNotFound { path, .. } => {
                assert_eq!(path, PathBuf::from("/no/such/shader.frag"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
