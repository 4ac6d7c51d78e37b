//! Loading resources straight out of a zip archive
//!
//! Run with: cargo run --example zip_archive --features archive-zip

use std::any::Any;
use std::io::Write;

use archetype_resource::{
    CacheConfig, FormatLoader, Resource, ResourceCache, ResourceKey, ZipExtractor,
};

#[derive(Debug)]
struct Shader {
    source: String,
}

impl Resource for Shader {
    fn size_cpu(&self) -> u64 {
        self.source.len() as u64
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct ShaderLoader;

impl FormatLoader for ShaderLoader {
    fn supports(&self, extension: &str) -> bool {
        matches!(extension, "vert" | "frag")
    }

    fn load(&self, path: &str, _key: ResourceKey) -> archetype_resource::Result<Box<dyn Resource>> {
        Ok(Box::new(Shader {
            source: std::fs::read_to_string(path)?,
        }))
    }
}

fn main() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let archive_path = dir.path().join("shaders.zip");
    {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&archive_path)?);
        writer.start_file("basic/flat.frag", zip::write::SimpleFileOptions::default())?;
        writer.write_all(b"void main() { gl_FragColor = vec4(1.0); }\n")?;
        writer.finish()?;
    }

    let cache = ResourceCache::new(CacheConfig::default().with_scratch_dir(dir.path()))?;
    cache.register_format_loader(ShaderLoader);
    cache.set_archive_extractor(ZipExtractor::new());

    let request = format!("{}/basic/flat.frag", archive_path.display());
    let shader = cache.load(&request)?;
    if let Some(shader) = shader.downcast_ref::<Shader>() {
        println!("Loaded '{}':\n{}", request, shader.source);
    }
    Ok(())
}
