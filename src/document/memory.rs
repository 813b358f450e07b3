//! In-memory reference implementation of the host document contract.
//!
//! Name-keyed maps with reference-counted mesh data blocks. Deep copy and
//! rename rewrite every cross-reference, so orchestration code can treat
//! names as stable handles the way the host application does.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

use crate::naming;

use super::Document;
use super::types::{
    AssetCounts, AssetKind, GroupRecord, ImageRecord, ImageSource, MaterialNode, MaterialRecord,
    MeshRecord, ObjectData, ObjectRecord, SceneCopy, SceneRecord, TextureRecord, WorldRecord,
};

#[derive(Debug, Default)]
pub struct MemoryDocument {
    scenes: BTreeMap<String, SceneRecord>,
    objects: BTreeMap<String, ObjectRecord>,
    meshes: BTreeMap<String, MeshRecord>,
    materials: BTreeMap<String, MaterialRecord>,
    textures: BTreeMap<String, TextureRecord>,
    images: BTreeMap<String, ImageRecord>,
    groups: BTreeMap<String, GroupRecord>,
    worlds: BTreeMap<String, WorldRecord>,
    active_scene: String,
}

impl MemoryDocument {
    pub fn new(scene_name: &str) -> Self {
        let mut doc = MemoryDocument::default();
        doc.scenes
            .insert(scene_name.to_string(), SceneRecord::new(scene_name));
        doc.active_scene = scene_name.to_string();
        doc
    }

    /// User-created entities must never carry the reserved sandbox suffix;
    /// this is what makes the suffix renaming scheme collision-proof. Only
    /// duplicated entities (recognizable by their origin tag) may be
    /// inserted under a suffixed name.
    fn check_insert(name: &str, origin: Option<&str>) -> Result<()> {
        if naming::is_sandbox_name(name) && origin.is_none() {
            bail!("name '{name}' carries the reserved sandbox suffix");
        }
        Ok(())
    }

    fn unique_copy_name(&self, kind: AssetKind, base: &str) -> String {
        for n in 1u32.. {
            let candidate = format!("{base}.{n:03}");
            if !self.exists(kind, &candidate) {
                return candidate;
            }
        }
        unreachable!()
    }

    /// Delete an object record and release its data block reference.
    fn delete_object_record(&mut self, name: &str) -> Result<()> {
        let record = self
            .objects
            .remove(name)
            .ok_or_else(|| anyhow!("unknown object: {name}"))?;
        if let ObjectData::Mesh { mesh } = &record.data {
            let orphaned = match self.meshes.get_mut(mesh) {
                Some(m) => {
                    m.users = m.users.saturating_sub(1);
                    m.users == 0
                }
                None => false,
            };
            if orphaned {
                self.meshes.remove(mesh);
            }
        }
        for group in self.groups.values_mut() {
            group.members.retain(|m| m != name);
        }
        Ok(())
    }

    fn rewrite_object_refs(&mut self, from: &str, to: &str) {
        for scene in self.scenes.values_mut() {
            for o in &mut scene.objects {
                if o == from {
                    *o = to.to_string();
                }
            }
            if scene.active_object.as_deref() == Some(from) {
                scene.active_object = Some(to.to_string());
            }
        }
        for group in self.groups.values_mut() {
            for m in &mut group.members {
                if m == from {
                    *m = to.to_string();
                }
            }
        }
    }

    fn rewrite_image_refs(&mut self, from: &str, to: &str) {
        for material in self.materials.values_mut() {
            for (_, node) in &mut material.tree.nodes {
                if let MaterialNode::ImageTexture { image, .. } = node
                    && image == from
                {
                    *image = to.to_string();
                }
            }
        }
        for texture in self.textures.values_mut() {
            if texture.image.as_deref() == Some(from) {
                texture.image = Some(to.to_string());
            }
        }
        for object in self.objects.values_mut() {
            for channel in &mut object.uv_channels {
                if channel.target_image.as_deref() == Some(from) {
                    channel.target_image = Some(to.to_string());
                }
            }
        }
    }
}

impl Document for MemoryDocument {
    fn active_scene(&self) -> &str {
        &self.active_scene
    }

    fn set_active_scene(&mut self, name: &str) -> Result<()> {
        if !self.scenes.contains_key(name) {
            bail!("unknown scene: {name}");
        }
        self.active_scene = name.to_string();
        Ok(())
    }

    fn create_scene(&mut self, name: &str) -> Result<()> {
        Self::check_insert(name, None)?;
        if self.scenes.contains_key(name) {
            bail!("scene already exists: {name}");
        }
        self.scenes.insert(name.to_string(), SceneRecord::new(name));
        Ok(())
    }

    fn scene(&self, name: &str) -> Result<&SceneRecord> {
        self.scenes
            .get(name)
            .ok_or_else(|| anyhow!("unknown scene: {name}"))
    }

    fn scene_mut(&mut self, name: &str) -> Result<&mut SceneRecord> {
        self.scenes
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown scene: {name}"))
    }

    fn delete_scene(&mut self, name: &str) -> Result<()> {
        let scene = self.scene(name)?;
        if !scene.objects.is_empty() {
            bail!(
                "scene '{name}' still links {} object(s); delete them first",
                scene.objects.len()
            );
        }
        if self.scenes.len() == 1 {
            bail!("cannot delete the last scene");
        }
        self.scenes.remove(name);
        if self.active_scene == name {
            // Host behavior: fall back to some remaining scene.
            self.active_scene = self
                .scenes
                .keys()
                .next()
                .expect("at least one scene remains")
                .clone();
        }
        Ok(())
    }

    fn full_copy_scene(&mut self, source: &str, copy_name: &str) -> Result<SceneCopy> {
        if self.scenes.contains_key(copy_name) {
            bail!("scene already exists: {copy_name}");
        }
        let src = self.scene(source)?.clone();

        // Gather everything the scene references, transitively.
        let object_names = src.objects.clone();
        let mut mesh_names: Vec<String> = Vec::new();
        let mut material_names: Vec<String> = Vec::new();
        let mut group_names: Vec<String> = Vec::new();
        let mut texture_names: Vec<String> = Vec::new();
        let mut image_names: Vec<String> = Vec::new();

        let mut push_unique = |list: &mut Vec<String>, name: &str| {
            if !list.iter().any(|n| n == name) {
                list.push(name.to_string());
            }
        };

        for name in &object_names {
            let object = self.object(name)?;
            match &object.data {
                ObjectData::Mesh { mesh } => push_unique(&mut mesh_names, mesh),
                ObjectData::Instance { group } => push_unique(&mut group_names, group),
                ObjectData::Empty => {}
            }
            for slot in object.material_slots.iter().flatten() {
                push_unique(&mut material_names, slot);
            }
            for channel in &object.uv_channels {
                if let Some(img) = &channel.target_image {
                    push_unique(&mut image_names, img);
                }
            }
        }
        for (name, group) in &self.groups {
            if group.members.iter().any(|m| object_names.contains(m)) {
                push_unique(&mut group_names, name);
            }
        }
        for name in &material_names {
            let material = self.material(name)?;
            for slot in material.texture_slots.iter().flatten() {
                push_unique(&mut texture_names, &slot.texture);
            }
            for (_, node) in &material.tree.nodes {
                if let MaterialNode::ImageTexture { image, .. } = node {
                    push_unique(&mut image_names, image);
                }
            }
        }
        for name in &texture_names {
            if let Some(img) = self
                .textures
                .get(name)
                .ok_or_else(|| anyhow!("unknown texture: {name}"))?
                .image
                .clone()
            {
                push_unique(&mut image_names, &img);
            }
        }

        // Allocate copy names up front so references can be remapped.
        let mut object_map: BTreeMap<String, String> = BTreeMap::new();
        let mut mesh_map: BTreeMap<String, String> = BTreeMap::new();
        let mut material_map: BTreeMap<String, String> = BTreeMap::new();
        let mut texture_map: BTreeMap<String, String> = BTreeMap::new();
        let mut image_map: BTreeMap<String, String> = BTreeMap::new();
        let mut group_map: BTreeMap<String, String> = BTreeMap::new();

        for name in &object_names {
            let copy = self.unique_copy_name(AssetKind::Object, name);
            object_map.insert(name.clone(), copy);
        }
        for name in &mesh_names {
            let copy = self.unique_copy_name(AssetKind::Mesh, name);
            mesh_map.insert(name.clone(), copy);
        }
        for name in &material_names {
            let copy = self.unique_copy_name(AssetKind::Material, name);
            material_map.insert(name.clone(), copy);
        }
        for name in &texture_names {
            let copy = self.unique_copy_name(AssetKind::Texture, name);
            texture_map.insert(name.clone(), copy);
        }
        for name in &image_names {
            let copy = self.unique_copy_name(AssetKind::Image, name);
            image_map.insert(name.clone(), copy);
        }
        for name in &group_names {
            let copy = self.unique_copy_name(AssetKind::Group, name);
            group_map.insert(name.clone(), copy);
        }

        let mut ledger = SceneCopy {
            scene: copy_name.to_string(),
            ..SceneCopy::default()
        };

        for (old, new) in &mesh_map {
            let mut record = self
                .meshes
                .get(old)
                .ok_or_else(|| anyhow!("unknown mesh: {old}"))?
                .clone();
            record.name = new.clone();
            record.users = 0;
            self.meshes.insert(new.clone(), record);
            ledger.meshes.push(new.clone());
        }
        for (old, new) in &image_map {
            let mut record = self
                .images
                .get(old)
                .ok_or_else(|| anyhow!("unknown image: {old}"))?
                .clone();
            record.name = new.clone();
            self.images.insert(new.clone(), record);
            ledger.images.push(new.clone());
        }
        for (old, new) in &texture_map {
            let mut record = self
                .textures
                .get(old)
                .ok_or_else(|| anyhow!("unknown texture: {old}"))?
                .clone();
            record.name = new.clone();
            let mapped = record
                .image
                .as_ref()
                .and_then(|img| image_map.get(img))
                .cloned();
            if mapped.is_some() {
                record.image = mapped;
            }
            self.textures.insert(new.clone(), record);
            ledger.textures.push(new.clone());
        }
        for (old, new) in &material_map {
            let mut record = self
                .materials
                .get(old)
                .ok_or_else(|| anyhow!("unknown material: {old}"))?
                .clone();
            record.name = new.clone();
            for slot in record.texture_slots.iter_mut().flatten() {
                if let Some(mapped) = texture_map.get(&slot.texture) {
                    slot.texture = mapped.clone();
                }
            }
            for (_, node) in &mut record.tree.nodes {
                if let MaterialNode::ImageTexture { image, .. } = node
                    && let Some(mapped) = image_map.get(image)
                {
                    *image = mapped.clone();
                }
            }
            self.materials.insert(new.clone(), record);
            ledger.materials.push(new.clone());
        }
        for (old, new) in &group_map {
            let mut record = self
                .groups
                .get(old)
                .ok_or_else(|| anyhow!("unknown group: {old}"))?
                .clone();
            record.name = new.clone();
            record.members = record
                .members
                .iter()
                .filter_map(|m| object_map.get(m).cloned())
                .collect();
            self.groups.insert(new.clone(), record);
            ledger.groups.push(new.clone());
        }

        let world_copy = match &src.world {
            Some(world) => {
                let copy = self.unique_copy_name(AssetKind::World, world);
                let mut record = self
                    .worlds
                    .get(world)
                    .ok_or_else(|| anyhow!("unknown world: {world}"))?
                    .clone();
                record.name = copy.clone();
                self.worlds.insert(copy.clone(), record);
                ledger.worlds.push(copy.clone());
                Some(copy)
            }
            None => None,
        };

        let mut scene_objects = Vec::with_capacity(object_names.len());
        for old in &object_names {
            let new = object_map.get(old).unwrap().clone();
            let mut record = self
                .objects
                .get(old)
                .ok_or_else(|| anyhow!("unknown object: {old}"))?
                .clone();
            record.name = new.clone();
            match &mut record.data {
                ObjectData::Mesh { mesh } => {
                    let mapped = mesh_map.get(mesh).unwrap().clone();
                    *mesh = mapped.clone();
                    self.meshes.get_mut(&mapped).unwrap().users += 1;
                }
                ObjectData::Instance { group } => {
                    if let Some(mapped) = group_map.get(group) {
                        *group = mapped.clone();
                    }
                }
                ObjectData::Empty => {}
            }
            for slot in record.material_slots.iter_mut().flatten() {
                if let Some(mapped) = material_map.get(slot) {
                    *slot = mapped.clone();
                }
            }
            for channel in &mut record.uv_channels {
                let mapped = channel
                    .target_image
                    .as_ref()
                    .and_then(|img| image_map.get(img))
                    .cloned();
                if mapped.is_some() {
                    channel.target_image = mapped;
                }
            }
            self.objects.insert(new.clone(), record);
            ledger.objects.push(new.clone());
            scene_objects.push(new);
        }

        let mut copy = SceneRecord::new(copy_name);
        copy.objects = scene_objects;
        copy.world = world_copy;
        copy.active_object = src
            .active_object
            .as_ref()
            .and_then(|o| object_map.get(o).cloned());
        copy.bake = src.bake.clone();
        self.scenes.insert(copy_name.to_string(), copy);

        Ok(ledger)
    }

    fn object(&self, name: &str) -> Result<&ObjectRecord> {
        self.objects
            .get(name)
            .ok_or_else(|| anyhow!("unknown object: {name}"))
    }

    fn object_mut(&mut self, name: &str) -> Result<&mut ObjectRecord> {
        self.objects
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown object: {name}"))
    }

    fn add_object(&mut self, scene: &str, record: ObjectRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.objects.contains_key(&record.name) {
            bail!("object already exists: {}", record.name);
        }
        if let ObjectData::Mesh { mesh } = &record.data {
            let mesh = self
                .meshes
                .get_mut(mesh)
                .ok_or_else(|| anyhow!("object '{}' links unknown mesh", record.name))?;
            mesh.users += 1;
        }
        let name = record.name.clone();
        self.scene_mut(scene)?.objects.push(name.clone());
        self.objects.insert(name, record);
        Ok(())
    }

    fn unlink_and_delete_object(&mut self, scene: &str, name: &str) -> Result<()> {
        let scene = self.scene_mut(scene)?;
        let Some(pos) = scene.objects.iter().position(|o| o == name) else {
            bail!("object '{name}' is not linked in scene '{}'", scene.name);
        };
        scene.objects.remove(pos);
        if scene.active_object.as_deref() == Some(name) {
            scene.active_object = None;
        }
        self.delete_object_record(name)
    }

    fn add_mesh(&mut self, record: MeshRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.meshes.contains_key(&record.name) {
            bail!("mesh already exists: {}", record.name);
        }
        self.meshes.insert(record.name.clone(), record);
        Ok(())
    }

    fn add_material(&mut self, record: MaterialRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.materials.contains_key(&record.name) {
            bail!("material already exists: {}", record.name);
        }
        self.materials.insert(record.name.clone(), record);
        Ok(())
    }

    fn material(&self, name: &str) -> Result<&MaterialRecord> {
        self.materials
            .get(name)
            .ok_or_else(|| anyhow!("unknown material: {name}"))
    }

    fn material_mut(&mut self, name: &str) -> Result<&mut MaterialRecord> {
        self.materials
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown material: {name}"))
    }

    fn add_texture(&mut self, record: TextureRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.textures.contains_key(&record.name) {
            bail!("texture already exists: {}", record.name);
        }
        self.textures.insert(record.name.clone(), record);
        Ok(())
    }

    fn add_image(&mut self, record: ImageRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.images.contains_key(&record.name) {
            bail!("image already exists: {}", record.name);
        }
        self.images.insert(record.name.clone(), record);
        Ok(())
    }

    fn image(&self, name: &str) -> Result<&ImageRecord> {
        self.images
            .get(name)
            .ok_or_else(|| anyhow!("unknown image: {name}"))
    }

    fn image_mut(&mut self, name: &str) -> Result<&mut ImageRecord> {
        self.images
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown image: {name}"))
    }

    fn load_image(&mut self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow!("image path has no file name: {}", path.display()))?
            .to_string_lossy()
            .to_string();
        // Evict any stale image cached under the same file name so a re-run
        // picks up the freshly written file.
        self.images.remove(&name);

        let decoded = image::open(path)
            .with_context(|| format!("failed to load image at {}", path.display()))?
            .to_rgba32f();
        let (width, height) = decoded.dimensions();
        let pixels = decoded.pixels().map(|p| p.0).collect();
        self.images.insert(
            name.clone(),
            ImageRecord {
                name: name.clone(),
                origin: None,
                width,
                height,
                pixels,
                source: ImageSource::File(path.to_path_buf()),
            },
        );
        Ok(name)
    }

    fn add_group(&mut self, record: GroupRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.groups.contains_key(&record.name) {
            bail!("group already exists: {}", record.name);
        }
        self.groups.insert(record.name.clone(), record);
        Ok(())
    }

    fn group(&self, name: &str) -> Result<&GroupRecord> {
        self.groups
            .get(name)
            .ok_or_else(|| anyhow!("unknown group: {name}"))
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut GroupRecord> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown group: {name}"))
    }

    fn add_world(&mut self, record: WorldRecord) -> Result<()> {
        Self::check_insert(&record.name, record.origin.as_deref())?;
        if self.worlds.contains_key(&record.name) {
            bail!("world already exists: {}", record.name);
        }
        self.worlds.insert(record.name.clone(), record);
        Ok(())
    }

    fn world_mut(&mut self, name: &str) -> Result<&mut WorldRecord> {
        self.worlds
            .get_mut(name)
            .ok_or_else(|| anyhow!("unknown world: {name}"))
    }

    fn exists(&self, kind: AssetKind, name: &str) -> bool {
        match kind {
            AssetKind::Object => self.objects.contains_key(name),
            AssetKind::Mesh => self.meshes.contains_key(name),
            AssetKind::Material => self.materials.contains_key(name),
            AssetKind::Texture => self.textures.contains_key(name),
            AssetKind::Image => self.images.contains_key(name),
            AssetKind::Group => self.groups.contains_key(name),
            AssetKind::World => self.worlds.contains_key(name),
            AssetKind::Scene => self.scenes.contains_key(name),
        }
    }

    fn names(&self, kind: AssetKind) -> Vec<String> {
        match kind {
            AssetKind::Object => self.objects.keys().cloned().collect(),
            AssetKind::Mesh => self.meshes.keys().cloned().collect(),
            AssetKind::Material => self.materials.keys().cloned().collect(),
            AssetKind::Texture => self.textures.keys().cloned().collect(),
            AssetKind::Image => self.images.keys().cloned().collect(),
            AssetKind::Group => self.groups.keys().cloned().collect(),
            AssetKind::World => self.worlds.keys().cloned().collect(),
            AssetKind::Scene => self.scenes.keys().cloned().collect(),
        }
    }

    fn rename(&mut self, kind: AssetKind, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if !self.exists(kind, from) {
            bail!("cannot rename unknown {kind:?}: {from}");
        }
        if self.exists(kind, to) {
            bail!("rename target already exists: {to}");
        }
        match kind {
            AssetKind::Object => {
                let mut record = self.objects.remove(from).unwrap();
                record.name = to.to_string();
                self.objects.insert(to.to_string(), record);
                self.rewrite_object_refs(from, to);
            }
            AssetKind::Mesh => {
                let mut record = self.meshes.remove(from).unwrap();
                record.name = to.to_string();
                self.meshes.insert(to.to_string(), record);
                for object in self.objects.values_mut() {
                    if let ObjectData::Mesh { mesh } = &mut object.data
                        && mesh == from
                    {
                        *mesh = to.to_string();
                    }
                }
            }
            AssetKind::Material => {
                let mut record = self.materials.remove(from).unwrap();
                record.name = to.to_string();
                self.materials.insert(to.to_string(), record);
                for object in self.objects.values_mut() {
                    for slot in object.material_slots.iter_mut().flatten() {
                        if slot == from {
                            *slot = to.to_string();
                        }
                    }
                }
            }
            AssetKind::Texture => {
                let mut record = self.textures.remove(from).unwrap();
                record.name = to.to_string();
                self.textures.insert(to.to_string(), record);
                for material in self.materials.values_mut() {
                    for slot in material.texture_slots.iter_mut().flatten() {
                        if slot.texture == from {
                            slot.texture = to.to_string();
                        }
                    }
                }
            }
            AssetKind::Image => {
                let mut record = self.images.remove(from).unwrap();
                record.name = to.to_string();
                self.images.insert(to.to_string(), record);
                self.rewrite_image_refs(from, to);
            }
            AssetKind::Group => {
                let mut record = self.groups.remove(from).unwrap();
                record.name = to.to_string();
                self.groups.insert(to.to_string(), record);
                for object in self.objects.values_mut() {
                    if let ObjectData::Instance { group } = &mut object.data
                        && group == from
                    {
                        *group = to.to_string();
                    }
                }
            }
            AssetKind::World => {
                let mut record = self.worlds.remove(from).unwrap();
                record.name = to.to_string();
                self.worlds.insert(to.to_string(), record);
                for scene in self.scenes.values_mut() {
                    if scene.world.as_deref() == Some(from) {
                        scene.world = Some(to.to_string());
                    }
                }
            }
            AssetKind::Scene => {
                let mut record = self.scenes.remove(from).unwrap();
                record.name = to.to_string();
                self.scenes.insert(to.to_string(), record);
                if self.active_scene == from {
                    self.active_scene = to.to_string();
                }
            }
        }
        Ok(())
    }

    fn remove(&mut self, kind: AssetKind, name: &str) -> Result<()> {
        match kind {
            AssetKind::Object => {
                let linked: Vec<String> = self
                    .scenes
                    .values()
                    .filter(|s| s.objects.iter().any(|o| o == name))
                    .map(|s| s.name.clone())
                    .collect();
                for scene in &linked {
                    let scene = self.scene_mut(scene)?;
                    scene.objects.retain(|o| o != name);
                    if scene.active_object.as_deref() == Some(name) {
                        scene.active_object = None;
                    }
                }
                self.delete_object_record(name)?;
            }
            AssetKind::Mesh => {
                let mesh = self
                    .meshes
                    .get(name)
                    .ok_or_else(|| anyhow!("unknown mesh: {name}"))?;
                if mesh.users > 0 {
                    bail!("mesh '{name}' still has {} user(s)", mesh.users);
                }
                self.meshes.remove(name);
            }
            AssetKind::Material => {
                if self.materials.remove(name).is_none() {
                    bail!("unknown material: {name}");
                }
                for object in self.objects.values_mut() {
                    for slot in &mut object.material_slots {
                        if slot.as_deref() == Some(name) {
                            *slot = None;
                        }
                    }
                }
            }
            AssetKind::Texture => {
                if self.textures.remove(name).is_none() {
                    bail!("unknown texture: {name}");
                }
                for material in self.materials.values_mut() {
                    for slot in &mut material.texture_slots {
                        if slot.as_ref().is_some_and(|s| s.texture == name) {
                            *slot = None;
                        }
                    }
                }
            }
            AssetKind::Image => {
                if self.images.remove(name).is_none() {
                    bail!("unknown image: {name}");
                }
                for texture in self.textures.values_mut() {
                    if texture.image.as_deref() == Some(name) {
                        texture.image = None;
                    }
                }
                for object in self.objects.values_mut() {
                    for channel in &mut object.uv_channels {
                        if channel.target_image.as_deref() == Some(name) {
                            channel.target_image = None;
                        }
                    }
                }
            }
            AssetKind::Group => {
                let instanced = self
                    .objects
                    .values()
                    .any(|o| matches!(&o.data, ObjectData::Instance { group } if group == name));
                if instanced {
                    bail!("group '{name}' is still instanced by an object");
                }
                if self.groups.remove(name).is_none() {
                    bail!("unknown group: {name}");
                }
            }
            AssetKind::World => {
                if self.worlds.remove(name).is_none() {
                    bail!("unknown world: {name}");
                }
                for scene in self.scenes.values_mut() {
                    if scene.world.as_deref() == Some(name) {
                        scene.world = None;
                    }
                }
            }
            AssetKind::Scene => self.delete_scene(name)?,
        }
        Ok(())
    }

    fn tag_origins(&mut self) {
        for (name, record) in &mut self.objects {
            record.origin = Some(name.clone());
        }
        for (name, record) in &mut self.meshes {
            record.origin = Some(name.clone());
        }
        for (name, record) in &mut self.materials {
            record.origin = Some(name.clone());
        }
        for (name, record) in &mut self.textures {
            record.origin = Some(name.clone());
        }
        for (name, record) in &mut self.images {
            record.origin = Some(name.clone());
        }
        for (name, record) in &mut self.groups {
            record.origin = Some(name.clone());
        }
        for (name, record) in &mut self.worlds {
            record.origin = Some(name.clone());
        }
    }

    fn origin(&self, kind: AssetKind, name: &str) -> Option<String> {
        match kind {
            AssetKind::Object => self.objects.get(name).and_then(|r| r.origin.clone()),
            AssetKind::Mesh => self.meshes.get(name).and_then(|r| r.origin.clone()),
            AssetKind::Material => self.materials.get(name).and_then(|r| r.origin.clone()),
            AssetKind::Texture => self.textures.get(name).and_then(|r| r.origin.clone()),
            AssetKind::Image => self.images.get(name).and_then(|r| r.origin.clone()),
            AssetKind::Group => self.groups.get(name).and_then(|r| r.origin.clone()),
            AssetKind::World => self.worlds.get(name).and_then(|r| r.origin.clone()),
            AssetKind::Scene => None,
        }
    }

    fn counts(&self) -> AssetCounts {
        AssetCounts {
            objects: self.objects.len(),
            meshes: self.meshes.len(),
            materials: self.materials.len(),
            textures: self.textures.len(),
            images: self.images.len(),
            groups: self.groups.len(),
            worlds: self.worlds.len(),
            scenes: self.scenes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::types::UvChannel;

    fn doc_with_cube() -> MemoryDocument {
        let mut doc = MemoryDocument::new("Scene");
        doc.add_mesh(MeshRecord::new("cube-data")).unwrap();
        doc.add_material(MaterialRecord::new("paint")).unwrap();
        let mut cube = ObjectRecord::new(
            "cube",
            ObjectData::Mesh {
                mesh: "cube-data".to_string(),
            },
        );
        cube.material_slots = vec![Some("paint".to_string())];
        cube.uv_channels = vec![UvChannel {
            name: "uv0".to_string(),
            target_image: None,
        }];
        doc.add_object("Scene", cube).unwrap();
        doc
    }

    #[test]
    fn full_copy_then_teardown_restores_counts() {
        let mut doc = doc_with_cube();
        let before = doc.counts();

        doc.tag_origins();
        let ledger = doc.full_copy_scene("Scene", "copy").unwrap();
        assert_eq!(ledger.objects.len(), 1);
        assert_eq!(ledger.meshes.len(), 1);
        assert_eq!(ledger.materials.len(), 1);

        for name in &ledger.objects {
            doc.unlink_and_delete_object("copy", name).unwrap();
        }
        for name in &ledger.materials {
            doc.remove(AssetKind::Material, name).unwrap();
        }
        doc.delete_scene("copy").unwrap();
        assert_eq!(doc.counts(), before);
    }

    #[test]
    fn copies_inherit_origin_tags() {
        let mut doc = doc_with_cube();
        doc.tag_origins();
        let ledger = doc.full_copy_scene("Scene", "copy").unwrap();
        let copy = &ledger.objects[0];
        assert_ne!(copy, "cube");
        assert_eq!(
            doc.origin(AssetKind::Object, copy).as_deref(),
            Some("cube")
        );
    }

    #[test]
    fn rename_rewrites_references() {
        let mut doc = doc_with_cube();
        doc.rename(AssetKind::Material, "paint", "paint.renamed")
            .unwrap();
        let cube = doc.object("cube").unwrap();
        assert_eq!(
            cube.material_slots[0].as_deref(),
            Some("paint.renamed")
        );
    }

    #[test]
    fn deleting_last_mesh_user_frees_the_data_block() {
        let mut doc = doc_with_cube();
        assert!(doc.exists(AssetKind::Mesh, "cube-data"));
        doc.unlink_and_delete_object("Scene", "cube").unwrap();
        assert!(!doc.exists(AssetKind::Mesh, "cube-data"));
    }

    #[test]
    fn reserved_suffix_rejected_on_insert() {
        let mut doc = MemoryDocument::new("Scene");
        let err = doc
            .add_material(MaterialRecord::new(crate::naming::sandbox_name("mat")))
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn nonempty_scene_refuses_deletion() {
        let mut doc = doc_with_cube();
        doc.create_scene("other").unwrap();
        assert!(doc.delete_scene("Scene").is_err());
    }
}
