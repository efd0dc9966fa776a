//! Id-keyed asset libraries.
//!
//! Each library maps an [`AssetId`] to a shared resource. Loading is
//! get-or-create: the first resource stored under an id wins, and later loads
//! with the same id return it unchanged, ignoring their arguments. Callers
//! that need different parameters must register a different id.
//!
//! Texture, shader and material libraries own a fallback resource that is
//! returned for unknown ids and for loads that fail, so a draw never lacks a
//! resource. The mesh library has no fallback.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::rc::Rc;

use aether_core::AssetId;

use crate::context::GraphicsContext;
use crate::materials::Material;
use crate::mesh::{Mesh, MeshSpec};
use crate::resources::Texture2D;
use crate::shader::Shader;
use crate::types::TextureSpec;

/// Generic id → `Rc<T>` store with first-writer-wins semantics.
pub struct AssetLibrary<T> {
    kind: &'static str,
    assets: HashMap<AssetId, Rc<T>>,
}

impl<T> AssetLibrary<T> {
    /// `kind` names the asset type in log messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            assets: HashMap::new(),
        }
    }

    /// Return the resource stored under `id`, creating it with `factory` on a miss.
    ///
    /// On a hit `factory` is not called.
    pub fn get_or_create(&mut self, id: AssetId, factory: impl FnOnce() -> T) -> Rc<T> {
        if let Some(existing) = self.assets.get(&id) {
            log::warn!("{} Library: id {id} already loaded, returning cached", self.kind);
            return existing.clone();
        }
        let asset = Rc::new(factory());
        self.assets.insert(id, asset.clone());
        asset
    }

    /// Like [`get_or_create`](Self::get_or_create) for factories that can
    /// fail. A failure is logged and nothing is stored.
    pub fn try_get_or_create<E: Display>(
        &mut self,
        id: AssetId,
        factory: impl FnOnce() -> Result<T, E>,
    ) -> Result<Rc<T>, E> {
        if let Some(existing) = self.assets.get(&id) {
            log::warn!("{} Library: id {id} already loaded, returning cached", self.kind);
            return Ok(existing.clone());
        }
        match factory() {
            Ok(asset) => {
                let asset = Rc::new(asset);
                self.assets.insert(id, asset.clone());
                Ok(asset)
            }
            Err(e) => {
                log::error!("{} Library: failed to load {id}: {e}", self.kind);
                Err(e)
            }
        }
    }

    /// Store an already built resource. An existing entry wins and is returned.
    pub fn insert(&mut self, id: AssetId, asset: Rc<T>) -> Rc<T> {
        if let Some(existing) = self.assets.get(&id) {
            log::warn!("{} Library: id {id} already loaded, returning cached", self.kind);
            return existing.clone();
        }
        self.assets.insert(id, asset.clone());
        asset
    }

    /// Lookup, substituting `fallback` (with a warning) on a miss.
    pub fn get_or(&self, id: AssetId, fallback: &Rc<T>) -> Rc<T> {
        match self.assets.get(&id) {
            Some(asset) => asset.clone(),
            None => {
                log::warn!("{} Library: id {id} not found!", self.kind);
                fallback.clone()
            }
        }
    }

    pub fn try_get(&self, id: AssetId) -> Option<Rc<T>> {
        self.assets.get(&id).cloned()
    }

    pub fn exists(&self, id: AssetId) -> bool {
        self.assets.contains_key(&id)
    }

    pub fn remove(&mut self, id: AssetId) -> Option<Rc<T>> {
        self.assets.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.assets.keys().copied()
    }

    pub fn clear(&mut self) {
        self.assets.clear();
    }
}

/// Lookup methods shared by the typed libraries.
macro_rules! library_lookup {
    ($asset:ty) => {
        /// Lookup; an unknown id yields the fallback.
        pub fn get(&self, id: AssetId) -> Rc<$asset> {
            self.assets.get_or(id, &self.fallback)
        }

        pub fn try_get(&self, id: AssetId) -> Option<Rc<$asset>> {
            self.assets.try_get(id)
        }

        pub fn exists(&self, id: AssetId) -> bool {
            self.assets.exists(id)
        }

        /// Store an already built resource. An existing entry wins.
        pub fn insert(&mut self, id: AssetId, asset: Rc<$asset>) -> Rc<$asset> {
            self.assets.insert(id, asset)
        }

        pub fn remove(&mut self, id: AssetId) -> Option<Rc<$asset>> {
            self.assets.remove(id)
        }

        pub fn fallback(&self) -> &Rc<$asset> {
            &self.fallback
        }

        pub fn len(&self) -> usize {
            self.assets.len()
        }

        pub fn is_empty(&self) -> bool {
            self.assets.is_empty()
        }
    };
}

/// 2D textures; falls back to the magenta checker.
pub struct TextureLibrary {
    ctx: GraphicsContext,
    assets: AssetLibrary<Texture2D>,
    fallback: Rc<Texture2D>,
}

impl TextureLibrary {
    pub fn new(ctx: &GraphicsContext) -> Self {
        log::info!("TextureLibrary initialized");
        Self {
            ctx: ctx.clone(),
            assets: AssetLibrary::new("Texture"),
            fallback: Rc::new(Texture2D::error_texture(ctx)),
        }
    }

    library_lookup!(Texture2D);

    /// Decode an image file. Wrap is repeat; `flip` flips rows vertically.
    pub fn load_file(&mut self, id: AssetId, path: impl AsRef<Path>, flip: bool) -> Rc<Texture2D> {
        let ctx = &self.ctx;
        self.assets
            .try_get_or_create(id, || Texture2D::from_file(ctx, path.as_ref(), flip))
            .unwrap_or_else(|_| self.fallback.clone())
    }

    /// Decode an encoded image held in memory.
    pub fn load_memory(&mut self, id: AssetId, bytes: &[u8]) -> Rc<Texture2D> {
        let ctx = &self.ctx;
        self.assets
            .try_get_or_create(id, || Texture2D::from_memory(ctx, bytes))
            .unwrap_or_else(|_| self.fallback.clone())
    }

    /// Allocate an empty texture; fill it with [`Texture2D::set_data`].
    pub fn load_spec(&mut self, id: AssetId, spec: TextureSpec) -> Rc<Texture2D> {
        let ctx = &self.ctx;
        self.assets.get_or_create(id, || Texture2D::from_spec(ctx, spec))
    }
}

/// Shader programs; falls back to the magenta error shader.
pub struct ShaderLibrary {
    ctx: GraphicsContext,
    assets: AssetLibrary<Shader>,
    fallback: Rc<Shader>,
}

impl ShaderLibrary {
    pub fn new(ctx: &GraphicsContext) -> Self {
        log::info!("ShaderLibrary initialized");
        Self {
            ctx: ctx.clone(),
            assets: AssetLibrary::new("Shader"),
            fallback: Rc::new(Shader::error_shader(ctx)),
        }
    }

    library_lookup!(Shader);

    pub fn load_file(&mut self, id: AssetId, path: impl AsRef<Path>) -> Rc<Shader> {
        let ctx = &self.ctx;
        self.assets
            .try_get_or_create(id, || Shader::from_file(ctx, path.as_ref()))
            .unwrap_or_else(|_| self.fallback.clone())
    }

    pub fn load_source(&mut self, id: AssetId, name: &str, text: &str) -> Rc<Shader> {
        let ctx = &self.ctx;
        self.assets
            .try_get_or_create(id, || Shader::from_source(ctx, name, text))
            .unwrap_or_else(|_| self.fallback.clone())
    }
}

/// Materials; falls back to a magenta material over the error shader.
pub struct MaterialLibrary {
    assets: AssetLibrary<Material>,
    fallback: Rc<Material>,
}

impl MaterialLibrary {
    pub fn new(shaders: &ShaderLibrary) -> Self {
        log::info!("MaterialLibrary initialized");
        let mut fallback = Material::new(shaders.fallback().clone()).with_name("Error");
        fallback.set_float4("u_AlbedoColor", [1.0, 0.0, 1.0, 1.0]);
        Self {
            assets: AssetLibrary::new("Material"),
            fallback: Rc::new(fallback),
        }
    }

    library_lookup!(Material);

    /// Create an empty material over the shader registered as `shader_id`.
    /// An unknown shader id resolves to the error shader.
    pub fn load(&mut self, id: AssetId, shader_id: AssetId, shaders: &ShaderLibrary) -> Rc<Material> {
        self.assets
            .get_or_create(id, || Material::new(shaders.get(shader_id)))
    }
}

/// Meshes. Lookups of unknown ids return `None`.
pub struct MeshLibrary {
    ctx: GraphicsContext,
    assets: AssetLibrary<Mesh>,
}

impl MeshLibrary {
    pub fn new(ctx: &GraphicsContext) -> Self {
        log::info!("MeshLibrary initialized");
        Self {
            ctx: ctx.clone(),
            assets: AssetLibrary::new("Mesh"),
        }
    }

    pub fn load(&mut self, id: AssetId, spec: MeshSpec<'_>) -> Rc<Mesh> {
        let ctx = &self.ctx;
        self.assets.get_or_create(id, || Mesh::new(ctx, spec))
    }

    pub fn get(&self, id: AssetId) -> Option<Rc<Mesh>> {
        self.assets.try_get(id)
    }

    pub fn exists(&self, id: AssetId) -> bool {
        self.assets.exists(id)
    }

    pub fn insert(&mut self, id: AssetId, mesh: Rc<Mesh>) -> Rc<Mesh> {
        self.assets.insert(id, mesh)
    }

    pub fn remove(&mut self, id: AssetId) -> Option<Rc<Mesh>> {
        self.assets.remove(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_writer_wins() {
        let mut library: AssetLibrary<String> = AssetLibrary::new("Text");
        let id = AssetId::new();
        let a = library.get_or_create(id, || "first".to_string());
        let b = library.get_or_create(id, || panic!("factory must not run on a hit"));
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(*b, "first");
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_failed_factory_stores_nothing() {
        let mut library: AssetLibrary<u32> = AssetLibrary::new("Number");
        let id = AssetId::new();
        let result = library.try_get_or_create(id, || Err::<u32, _>("missing file"));
        assert_eq!(result, Err("missing file"));
        assert!(!library.exists(id));

        let ok = library.try_get_or_create(id, || Ok::<_, &str>(7)).unwrap();
        assert_eq!(*ok, 7);
    }

    #[test]
    fn test_get_or_fallback() {
        let mut library: AssetLibrary<u32> = AssetLibrary::new("Number");
        let fallback = Rc::new(0);
        let id = AssetId::new();
        assert!(Rc::ptr_eq(&library.get_or(id, &fallback), &fallback));
        library.insert(id, Rc::new(5));
        assert_eq!(*library.get_or(id, &fallback), 5);
        assert_eq!(library.ids().collect::<Vec<_>>(), vec![id]);
        assert_eq!(library.remove(id).as_deref(), Some(&5));
        assert!(library.is_empty());
    }

    #[test]
    fn test_insert_keeps_existing() {
        let mut library: AssetLibrary<u32> = AssetLibrary::new("Number");
        let id = AssetId::new();
        let first = library.insert(id, Rc::new(1));
        let second = library.insert(id, Rc::new(2));
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[cfg(feature = "dummy")]
    mod gpu {
        use super::*;
        use crate::mesh::generators;

        #[test]
        fn test_texture_fallbacks() {
            let (ctx, _dummy) = GraphicsContext::headless();
            let mut textures = TextureLibrary::new(&ctx);
            let id = AssetId::new();

            let missing = textures.load_file(id, "/nonexistent/albedo.png", true);
            assert!(Rc::ptr_eq(&missing, textures.fallback()));
            assert!(!textures.exists(id));
            assert!(Rc::ptr_eq(&textures.get(AssetId::new()), textures.fallback()));
            assert!(textures.try_get(id).is_none());
        }

        #[test]
        fn test_texture_spec_cached() {
            let (ctx, _dummy) = GraphicsContext::headless();
            let mut textures = TextureLibrary::new(&ctx);
            let id = AssetId::new();
            let a = textures.load_spec(id, TextureSpec::new(4, 4));
            let b = textures.load_spec(id, TextureSpec::new(64, 64));
            assert!(Rc::ptr_eq(&a, &b));
            assert_eq!(b.width(), 4);
        }

        #[test]
        fn test_shader_and_material_fallbacks() {
            let (ctx, _dummy) = GraphicsContext::headless();
            let mut shaders = ShaderLibrary::new(&ctx);
            let mut materials = MaterialLibrary::new(&shaders);

            let broken = shaders.load_source(AssetId::new(), "Broken", "#shader vertex\nvoid main() {}\n");
            assert!(Rc::ptr_eq(&broken, shaders.fallback()));

            let material = materials.load(AssetId::new(), AssetId::new(), &shaders);
            assert!(Rc::ptr_eq(material.shader(), shaders.fallback()));

            let fallback = materials.get(AssetId::new());
            assert_eq!(fallback.name(), "Error");
            assert!(Rc::ptr_eq(&fallback, materials.fallback()));
        }

        #[test]
        fn test_mesh_miss_is_none() {
            let (ctx, _dummy) = GraphicsContext::headless();
            let mut meshes = MeshLibrary::new(&ctx);
            let id = AssetId::new();
            assert!(meshes.get(id).is_none());
            let cube = generators::cube_vertices();
            let mesh = meshes.load(id, cube.spec());
            assert!(Rc::ptr_eq(&mesh, &meshes.get(id).unwrap()));
            assert_eq!(meshes.len(), 1);
        }
    }
}
