//! Reading rendered pixels back from the GPU.

use super::GpuRenderer;
use crate::error::RenderError;

/// Row pitch for texture-to-buffer copies, padded to the 256-byte
/// alignment the API requires.
pub(super) fn padded_bytes_per_row(width: u32) -> (u32, u32) {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;
    (unpadded, padded)
}

/// Drops the per-row padding a copy introduced.
pub(super) fn strip_row_padding(
    data: &[u8],
    height: u32,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
) -> Vec<u8> {
    if padded_bytes_per_row == unpadded_bytes_per_row {
        return data[..(unpadded_bytes_per_row * height) as usize].to_vec();
    }
    let mut output = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
    for row in 0..height {
        let start = (row * padded_bytes_per_row) as usize;
        output.extend_from_slice(&data[start..start + unpadded_bytes_per_row as usize]);
    }
    output
}

/// Maps a readback buffer synchronously and copies its contents out.
pub(super) fn map_buffer_bytes(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, RenderError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        if sender.send(result).is_err() {
            log::warn!("readback receiver dropped before map_async completed");
        }
    });

    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| RenderError::Readback(e.to_string()))?;

    receiver
        .recv()
        .map_err(|e| RenderError::Readback(e.to_string()))?
        .map_err(|e| RenderError::Readback(e.to_string()))?;

    let mapped = slice.get_mapped_range();
    let bytes = mapped.to_vec();
    drop(mapped);
    buffer.unmap();
    Ok(bytes)
}

impl GpuRenderer {
    /// Copies the composed frame out as tightly packed RGBA8 rows, top to
    /// bottom. Alpha is premultiplied, matching the pen and sprite blend
    /// states.
    pub fn read_pixels(&mut self) -> Result<Vec<u8>, RenderError> {
        let (width, height) = self.output_size();
        let (unpadded, padded) = padded_bytes_per_row(width);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_readback"),
            size: (padded as u64) * (height as u64),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.output,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let bytes = map_buffer_bytes(&self.device, &buffer)?;
        let required = (padded as usize) * (height as usize);
        if bytes.len() < required {
            return Err(RenderError::Readback(format!(
                "mapped {} bytes, expected {required}",
                bytes.len()
            )));
        }
        Ok(strip_row_padding(&bytes, height, unpadded, padded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_up_to_256() {
        assert_eq!(padded_bytes_per_row(480), (1920, 2048));
        assert_eq!(padded_bytes_per_row(64), (256, 256));
        assert_eq!(padded_bytes_per_row(1), (4, 256));
    }

    #[test]
    fn strip_row_padding_handles_tight_rows() {
        let data = vec![1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(strip_row_padding(&data, 2, 4, 4), data);
    }

    #[test]
    fn strip_row_padding_drops_padding() {
        let data = vec![1, 2, 3, 4, 9, 9, 9, 9, 5, 6, 7, 8, 8, 8, 8, 8];
        assert_eq!(strip_row_padding(&data, 2, 4, 8), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
