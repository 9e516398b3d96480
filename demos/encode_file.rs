//! Encode an image file to WebP.
//!
//! Usage: encode_file <input> <output.webp> [hint] [quality]

use std::env;
use std::fs::File;
use std::io::BufWriter;
use webpx_bridge::{encode_image, EncodeConfig, Error, ImageHint, ImageView};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: encode_file <input> <output.webp> [hint] [quality]");
        return Ok(());
    }

    let hint = args.get(3).map_or(ImageHint::Default, |h| ImageHint::from_name(h));
    let quality = match args.get(4) {
        Some(q) => q.parse()?,
        None => 85.0,
    };
    let config = EncodeConfig::new().quality(quality).hint(hint);

    let img = image::open(&args[1])?;
    let mut out = BufWriter::new(File::create(&args[2])?);

    let direct = ImageView::from_dynamic(&img).and_then(|view| encode_image(view, &mut out, &config));
    let written = match direct {
        Err(Error::UnsupportedFormat(layout)) => {
            eprintln!("{} is not encodable directly, converting to RGBA", layout);
            let rgba = image::DynamicImage::ImageRgba8(img.to_rgba8());
            encode_image(ImageView::from_dynamic(&rgba)?, &mut out, &config)?
        }
        other => other?,
    };

    eprintln!("Wrote {} bytes to {} (hint {})", written, args[2], hint);
    Ok(())
}
