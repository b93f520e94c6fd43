use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array1, Array4};
use ort::{session::Session, value::Value};

/// Face embedding produced by the recognition model.
///
/// The vector is kept exactly as the model emits it (no L2 normalization), so a
/// degenerate all-zero output stays detectable by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Array1<f32>,
}

impl Embedding {
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            vector: Array1::from_vec(values),
        }
    }

    /// Number of components, fixed by the model.
    pub fn dim(&self) -> usize {
        self.vector.len()
    }

    pub fn norm(&self) -> f32 {
        self.vector.dot(&self.vector).sqrt()
    }
}

/// Pixel preprocessing applied before the recognition model.
///
/// Each channel value `p` in `[0, 255]` becomes `(p - mean) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocess {
    /// Square input edge in pixels.
    pub size: u32,
    pub mean: f32,
    pub scale: f32,
    /// Feed channels as B, G, R instead of R, G, B.
    pub bgr: bool,
}

impl Default for Preprocess {
    /// ArcFace (MobileFaceNet, w600k) conventions: 112x112 RGB in [-1, 1].
    fn default() -> Self {
        Self {
            size: 112,
            mean: 127.5,
            scale: 1.0 / 127.5,
            bgr: false,
        }
    }
}

/// Convert an image into a `[1, 3, size, size]` NCHW tensor.
pub fn to_input_tensor(img: &DynamicImage, pre: &Preprocess) -> Result<Array4<f32>> {
    let size = pre.size;
    if size == 0 {
        anyhow::bail!("preprocess size must be positive");
    }
    let face_rgb = img
        .resize_exact(size, size, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let pixel_count = (size * size) as usize;
    let mut input_data = vec![0.0f32; 3 * pixel_count];

    // Planar layout: first plane is R (or B when bgr), then G, then B (or R)
    let (first, rest) = input_data.split_at_mut(pixel_count);
    let (green, last) = rest.split_at_mut(pixel_count);
    let (red, blue) = if pre.bgr {
        (last, first)
    } else {
        (first, last)
    };

    let pixels = face_rgb.as_raw();
    for i in 0..pixel_count {
        let idx = i * 3;
        red[i] = (pixels[idx] as f32 - pre.mean) * pre.scale;
        green[i] = (pixels[idx + 1] as f32 - pre.mean) * pre.scale;
        blue[i] = (pixels[idx + 2] as f32 - pre.mean) * pre.scale;
    }

    Ok(Array4::from_shape_vec(
        (1, 3, size as usize, size as usize),
        input_data,
    )?)
}

/// Encode a (pre-cropped) face image to an embedding.
pub fn encode_face(
    session: &mut Session,
    face_img: &DynamicImage,
    pre: &Preprocess,
) -> Result<Embedding> {
    let input_array = to_input_tensor(face_img, pre)?;
    let input_tensor = Value::from_array(input_array)?;

    let outputs = session.run(ort::inputs![input_tensor])?;
    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

    // Expecting shape [1, D]
    let embedding_size = if shape.len() == 2 {
        shape[1] as usize
    } else {
        data.len()
    };
    if embedding_size == 0 || embedding_size > data.len() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        anyhow::bail!("unexpected embedding output shape {:?}", dims);
    }

    let embedding_vec: Vec<f32> = data[0..embedding_size].to_vec();
    if embedding_vec.iter().any(|x| !x.is_finite()) {
        anyhow::bail!("model produced non-finite embedding values");
    }

    Ok(Embedding::from_vec(embedding_vec))
}
