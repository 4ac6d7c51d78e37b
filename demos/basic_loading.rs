//! Basic loading example for archetype_resource
//!
//! Registers a small Wavefront OBJ loader and loads the same mesh twice to
//! show that the second request shares the first decode.

use archetype_resource::{
    CacheConfig, Corner, FormatLoader, MeshAttributes, MeshResource, Resource, ResourceCache,
    ResourceError, ResourceKey,
};

const CUBE_FACE: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

/// Minimal OBJ loader: triangles only, no materials
struct ObjLoader;

impl ObjLoader {
    fn parse(path: &str, text: &str) -> archetype_resource::Result<MeshAttributes> {
        let mut attributes = MeshAttributes::default();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => attributes.positions.push(floats(path, parts)?),
                Some("vn") => attributes.normals.push(floats(path, parts)?),
                Some("vt") => attributes.tex_coords.push(floats(path, parts)?),
                Some("f") => {
                    for corner in parts {
                        attributes.corners.push(parse_corner(path, corner)?);
                    }
                }
                _ => {}
            }
        }
        Ok(attributes)
    }
}

fn floats<'a, const N: usize>(
    path: &str,
    parts: impl Iterator<Item = &'a str>,
) -> archetype_resource::Result<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|e| ResourceError::decode(path, format!("bad number '{part}': {e}")))?;
    }
    Ok(out)
}

fn parse_corner(path: &str, corner: &str) -> archetype_resource::Result<Corner> {
    // OBJ indices are 1-based
    let index = |field: Option<&str>| -> archetype_resource::Result<Option<u32>> {
        match field.filter(|f| !f.is_empty()) {
            None => Ok(None),
            Some(f) => f
                .parse::<u32>()
                .map(|i| Some(i.saturating_sub(1)))
                .map_err(|e| ResourceError::decode(path, format!("bad index '{f}': {e}"))),
        }
    };
    let mut fields = corner.split('/');
    let position = index(fields.next())?
        .ok_or_else(|| ResourceError::decode(path, "face corner without position"))?;
    Ok(Corner {
        position,
        tex_coord: index(fields.next())?,
        normal: index(fields.next())?,
    })
}

impl FormatLoader for ObjLoader {
    fn supports(&self, extension: &str) -> bool {
        extension == "obj"
    }

    fn load(&self, path: &str, key: ResourceKey) -> archetype_resource::Result<Box<dyn Resource>> {
        let text = std::fs::read_to_string(path)?;
        let attributes = Self::parse(path, &text)?;
        Ok(Box::new(MeshResource::from_attributes(path, key, &attributes)?))
    }

    fn name(&self) -> &str {
        "obj"
    }
}

fn main() -> anyhow::Result<()> {
    println!("archetype_resource v{}", archetype_resource::VERSION);

    let dir = tempfile::tempdir()?;
    let mesh_path = dir.path().join("quad.obj");
    std::fs::write(&mesh_path, CUBE_FACE)?;
    let mesh_path = mesh_path.to_string_lossy().into_owned();

    // 64MB of system memory, 256MB of video memory
    let cache = ResourceCache::new(CacheConfig::new(64 << 20, 256 << 20))?;
    cache.register_format_loader(ObjLoader);

    let first = cache.load(&mesh_path)?;
    let second = cache.load(&mesh_path)?;
    let mesh = first
        .downcast_ref::<MeshResource>()
        .ok_or_else(|| anyhow::anyhow!("unexpected resource type"))?;

    println!("Loaded {} vertices, {} indices", mesh.vertex_count(), mesh.index_count());
    println!("Shared instance: {}", first.ptr_eq(&second));
    println!("References: {}", first.ref_count());
    println!(
        "Memory usage: {} bytes CPU, {} bytes GPU",
        cache.mem_usage_cpu(),
        cache.mem_usage_gpu()
    );

    drop((first, second));
    println!("Resident after release: {}", cache.contains(&mesh_path));
    Ok(())
}
