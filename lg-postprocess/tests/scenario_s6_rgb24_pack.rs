//! Scenario S6 (spec.md §8), run end to end through the public chain
//! API rather than a stage's own unit tests: a 12x1 RGBA8 source packs
//! down to a published `frame_width=9`, `frame_height=1` texture tagged
//! `BGR_32`, and the first 9 32-bit words reconstruct the source's 36
//! color bytes in the documented lane order.

use lg_common::PixelFormat;
use lg_postprocess::{FrameDescription, PixelBuffer, PostProcessChain, Rgb24PackStage};

#[test]
fn scenario_s6_packed_rgb24_is_tagged_bgr32_end_to_end() {
    let mut chain = PostProcessChain::new(vec![Box::new(Rgb24PackStage)]);

    let width = 12u32;
    let height = 1u32;
    let src: Vec<u8> = (0..width).flat_map(|x| {
        let r = (x * 3) as u8;
        [r, r + 1, r + 2, 0xff]
    }).collect();

    let input = FrameDescription::new(width, height, width * 4, PixelFormat::Bgra);
    let configured = chain.configure(input);

    assert_eq!(configured.width, 9);
    assert_eq!(configured.height, 1);
    assert_eq!(configured.format, PixelFormat::Bgr32, "packed output must be tagged BGR_32, not RGB_24");

    let output = chain.run(PixelBuffer::new(input, src.clone()), None).unwrap();
    assert_eq!(output.desc.format, PixelFormat::Bgr32);
    assert_eq!(output.desc.width, 9);
    assert_eq!(output.desc.height, 1);

    // First 9 32-bit words (36 bytes) reconstruct the source's 36 color
    // bytes (every 4th, alpha, byte of the RGBA8 source dropped).
    let expected: Vec<u8> = src.chunks(4).flat_map(|px| [px[0], px[1], px[2]]).collect();
    assert_eq!(&output.data[..expected.len()], &expected[..]);
}
