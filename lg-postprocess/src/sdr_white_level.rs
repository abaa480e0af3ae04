//! SDR-white-level stage (§4.4), an alternative to HDR16→PQ10 for
//! displays whose SDR reference white has been recalibrated away from
//! the scRGB-standard 80 nits.

use lg_common::{DamageRect, PixelFormat};

use crate::desc::{FrameDescription, PixelBuffer, StageConfig};
use crate::error::{PostProcessError, PostProcessResult};
use crate::gpu::GpuContext;
use crate::hdr16_to_pq10::pq_encode;
use crate::stage::PostProcessStage;

fn half_to_f32(bits: u16) -> f32 {
    let sign = (bits >> 15) & 0x1;
    let exponent = (bits >> 10) & 0x1f;
    let mantissa = bits & 0x3ff;
    let value = if exponent == 0 {
        (mantissa as f32) * 2f32.powi(-24)
    } else {
        (1.0 + mantissa as f32 / 1024.0) * 2f32.powi(exponent as i32 - 15)
    };
    if sign == 1 { -value } else { value }
}

fn read_half(bytes: &[u8], offset: usize) -> f32 {
    half_to_f32(u16::from_le_bytes([bytes[offset], bytes[offset + 1]]))
}

fn quantize10(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 1023.0).round() as u32
}

fn quantize2(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 3.0).round() as u32
}

/// Multiplies the scRGB input by `80/nits`, so a pixel at scRGB 1.0 (the
/// scRGB reference white) lands at the user's configured SDR white
/// level instead of the PQ curve's absolute 80 nits.
pub fn sdr_white_level(src: &[u8], width: u32, height: u32, src_pitch: u32, nits: f32) -> PostProcessResult<Vec<u8>> {
    let scale = 80.0 / nits;
    let dst_pitch = width * 4;
    let mut dst = vec![0u8; (dst_pitch * height) as usize];

    for y in 0..height {
        for x in 0..width {
            let so = (y * src_pitch + x * 8) as usize;
            if so + 8 > src.len() {
                return Err(PostProcessError::ShortInput {
                    expected: so + 8,
                    actual: src.len(),
                    reason: "sdr_white_level source row",
                });
            }
            let r = read_half(src, so) * scale;
            let g = read_half(src, so + 2) * scale;
            let b = read_half(src, so + 4) * scale;
            let a = read_half(src, so + 6);

            let rq = quantize10(pq_encode(r * 80.0));
            let gq = quantize10(pq_encode(g * 80.0));
            let bq = quantize10(pq_encode(b * 80.0));
            let aq = quantize2(a);

            let word = rq | (gq << 10) | (bq << 20) | (aq << 30);
            let dst_off = (y * dst_pitch + x * 4) as usize;
            dst[dst_off..dst_off + 4].copy_from_slice(&word.to_le_bytes());
        }
    }
    Ok(dst)
}

/// Polls the configured SDR reference white level each frame (the
/// producer orchestrator owns the actual display-configuration query;
/// this stage just takes the current value as an input).
pub struct SdrWhiteLevelStage {
    pub nits: f32,
}

impl SdrWhiteLevelStage {
    pub fn new(nits: f32) -> Self {
        Self { nits }
    }
}

impl PostProcessStage for SdrWhiteLevelStage {
    fn name(&self) -> &'static str {
        "sdr-white-level"
    }

    fn configure(&mut self, input: &FrameDescription) -> StageConfig {
        if input.format != PixelFormat::Rgba16F {
            return StageConfig::Bypass;
        }
        StageConfig::Configured(FrameDescription::new(input.width, input.height, input.width * 4, PixelFormat::Rgba10))
    }

    fn run(&mut self, input: &PixelBuffer, _gpu: Option<&GpuContext>) -> PostProcessResult<PixelBuffer> {
        let data = sdr_white_level(&input.data, input.desc.width, input.desc.height, input.desc.pitch, self.nits)?;
        let out_desc = FrameDescription::new(input.desc.width, input.desc.height, input.desc.width * 4, PixelFormat::Rgba10);
        Ok(PixelBuffer::new(out_desc, data))
    }

    fn adjust_damage(&self, rects: &[DamageRect]) -> Vec<DamageRect> {
        rects.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_configured_white_level_darkens_reference_white() {
        fn half_bits(v: f32) -> u16 {
            let bits = v.to_bits();
            let sign = (bits >> 16) & 0x8000;
            let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
            let mantissa = (bits >> 13) & 0x3ff;
            if exp <= 0 {
                sign as u16
            } else {
                (sign | ((exp as u32) << 10) | mantissa) as u16
            }
        }
        let white = half_bits(1.0).to_le_bytes();
        let mut src = Vec::new();
        for _ in 0..4 {
            src.extend_from_slice(&white);
        }

        let at_80 = sdr_white_level(&src, 1, 1, 8, 80.0).unwrap();
        let at_300 = sdr_white_level(&src, 1, 1, 8, 300.0).unwrap();
        let w80 = u32::from_le_bytes([at_80[0], at_80[1], at_80[2], at_80[3]]) & 0x3ff;
        let w300 = u32::from_le_bytes([at_300[0], at_300[1], at_300[2], at_300[3]]) & 0x3ff;
        assert!(w300 < w80, "raising the reference white level should reduce the PQ code for the same scRGB input");
    }
}
