use anyhow::{anyhow, bail};
use image::ImageBuffer;
use jpeg_decoder::{Decoder, PixelFormat};

use super::Image;

pub(super) fn decode_jpeg(data: &[u8]) -> anyhow::Result<Image> {
    let mut decoder = Decoder::new(data);
    let pixels = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("JPEG decoder returned no image info"))?;

    let rgba = match info.pixel_format {
        PixelFormat::RGB24 => pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect::<Vec<_>>(),
        PixelFormat::L8 => pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        format => bail!("unsupported JPEG pixel format {:?}", format),
    };

    let (width, height) = (u32::from(info.width), u32::from(info.height));
    match ImageBuffer::from_raw(width, height, rgba) {
        Some(buf) => Ok(Image { buf }),
        None => bail!("decoded JPEG data does not match its {width}x{height} header"),
    }
}
