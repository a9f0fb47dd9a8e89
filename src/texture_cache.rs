//! The weak association from costume LODs to GPU textures.
//!
//! An entry lives exactly as long as its LOD is reachable from some
//! costume: the cache holds a `Weak` reference and prunes dead entries on
//! every lookup, which releases the texture. The cache never extends a
//! LOD's lifetime.

use std::sync::{Arc, Weak};

use ahash::AHashMap;

use crate::costume::{CostumeLod, LodId};

struct CacheEntry {
    lod: Weak<CostumeLod>,
    bind_group: Arc<wgpu::BindGroup>,
}

pub(crate) struct CostumeTextureCache {
    sampler: wgpu::Sampler,
    entries: AHashMap<LodId, CacheEntry>,
}

impl CostumeTextureCache {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("costume_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self {
            sampler,
            entries: AHashMap::new(),
        }
    }

    /// Returns the bind group for the LOD's texture, uploading it on a
    /// cache miss.
    pub(crate) fn bind_group_for(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        lod: &Arc<CostumeLod>,
    ) -> Arc<wgpu::BindGroup> {
        self.prune();

        if let Some(entry) = self.entries.get(&lod.id()) {
            if entry.lod.strong_count() > 0 {
                return entry.bind_group.clone();
            }
        }

        let extent = wgpu::Extent3d {
            width: lod.width(),
            height: lod.height(),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("costume_texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &lod.straight_rgba(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * lod.width()),
                rows_per_image: Some(lod.height()),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("costume_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));

        self.entries.insert(
            lod.id(),
            CacheEntry {
                lod: Arc::downgrade(lod),
                bind_group: bind_group.clone(),
            },
        );
        bind_group
    }

    /// Drops entries whose LOD is gone, releasing their textures.
    pub(crate) fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.lod.strong_count() > 0);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            log::debug!("released {dropped} costume texture(s) for dropped LODs");
        }
    }
}
