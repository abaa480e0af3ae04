use lg_common::DamageRect;

use crate::desc::{FrameDescription, PixelBuffer, StageConfig};
use crate::error::PostProcessResult;
use crate::gpu::GpuContext;
use crate::stage::PostProcessStage;

/// The ordered `src → pp[0] → pp[1] → … → fb` chain (§4.4). Stages that
/// bypass themselves for the current input are skipped by `run` and
/// `adjust_damage` until the chain is reconfigured again.
pub struct PostProcessChain {
    stages: Vec<Box<dyn PostProcessStage>>,
    active: Vec<bool>,
    output: Option<FrameDescription>,
}

impl PostProcessChain {
    pub fn new(stages: Vec<Box<dyn PostProcessStage>>) -> Self {
        let n = stages.len();
        Self { stages, active: vec![false; n], output: None }
    }

    /// Reconfigures every stage left to right. Returns the description
    /// the final active stage produces (or `input` unchanged if every
    /// stage bypassed).
    pub fn configure(&mut self, input: FrameDescription) -> FrameDescription {
        let mut current = input;
        for (stage, active) in self.stages.iter_mut().zip(self.active.iter_mut()) {
            match stage.configure(&current) {
                StageConfig::Bypass => {
                    *active = false;
                }
                StageConfig::Configured(out) => {
                    *active = true;
                    current = out;
                }
            }
        }
        self.output = Some(current);
        current
    }

    pub fn output_description(&self) -> Option<FrameDescription> {
        self.output
    }

    pub fn run(&mut self, input: PixelBuffer, gpu: Option<&GpuContext>) -> PostProcessResult<PixelBuffer> {
        let mut current = input;
        for (stage, active) in self.stages.iter_mut().zip(self.active.iter()) {
            if *active {
                current = stage.run(&current, gpu)?;
            }
        }
        Ok(current)
    }

    pub fn adjust_damage(&self, rects: &[DamageRect]) -> Vec<DamageRect> {
        let mut current = rects.to_vec();
        for (stage, active) in self.stages.iter().zip(self.active.iter()) {
            if *active {
                current = stage.adjust_damage(&current);
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsample::{DownsampleRule, DownsampleStage};
    use crate::rgb24_pack::Rgb24PackStage;
    use lg_common::PixelFormat;

    /// Scenario S5 (spec.md §8): a 3840x2160 frame matched by a
    /// `>1920x1080 -> 1920x1080` rule publishes at half resolution, with
    /// damage scaled by 0.5, expanded by one pixel, then clamped.
    #[test]
    fn scenario_s5_downsample_rule_match_scales_descriptor_and_damage() {
        let mut chain = PostProcessChain::new(vec![Box::new(DownsampleStage::new(vec![DownsampleRule {
            id: 1,
            greater: true,
            x: 1920,
            y: 1080,
            target_x: 1920,
            target_y: 1080,
        }]))]);

        let input = FrameDescription::new(3840, 2160, 3840 * 4, PixelFormat::Bgra);
        let out = chain.configure(input);
        assert_eq!((out.width, out.height), (1920, 1080));

        let rects = vec![DamageRect::new(100, 100, 200, 200)];
        let adjusted = chain.adjust_damage(&rects);
        assert_eq!(adjusted.len(), 1);
        assert!(adjusted[0].right() <= 1920 && adjusted[0].bottom() <= 1080);
    }

    /// Chains downsample into rgb24-pack, exercising property 8 (every
    /// stage that scales also carries its damage rects through in the
    /// output coordinate space) across two geometry-changing stages.
    #[test]
    fn downsample_then_rgb24_pack_compose() {
        let mut chain = PostProcessChain::new(vec![
            Box::new(DownsampleStage::new(vec![DownsampleRule { id: 1, greater: false, x: 4, y: 4, target_x: 2, target_y: 2 }])),
            Box::new(Rgb24PackStage),
        ]);

        let input = FrameDescription::new(4, 4, 4 * 4, PixelFormat::Bgra);
        let out = chain.configure(input);
        assert_eq!(out.format, PixelFormat::Bgr32);

        let pixels: Vec<u8> = (0..4 * 4).flat_map(|_| [1u8, 2, 3, 4]).collect();
        let buf = PixelBuffer::new(input, pixels);
        let result = chain.run(buf, None).unwrap();
        assert_eq!(result.desc.format, PixelFormat::Bgr32);

        let rects = vec![DamageRect::new(0, 0, 4, 4)];
        let adjusted = chain.adjust_damage(&rects);
        assert_eq!(adjusted.len(), 1);
    }
}
