use std::rc::Rc;

/// CPU-side RGBA8 image data, uploaded to the device when a textured object
/// is committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Row-major pixels, top row first, four bytes each.
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// Largest width or height accepted, matching wgpu's default
    /// `max_texture_dimension_2d`.
    pub const MAX_DIMENSION: u32 = 8192;

    /// Wraps raw RGBA data.
    ///
    /// The pixel buffer is truncated or padded with opaque white to exactly
    /// `width * height * 4` bytes. A zero-sized texture, or one wider or taller
    /// than [`MAX_DIMENSION`](Self::MAX_DIMENSION), becomes a single white
    /// pixel so it can always be sampled.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::TextureData;
    ///
    /// let texture = TextureData::from_rgba(2, 1, vec![255, 0, 0, 255]);
    /// assert_eq!(texture.byte_len(), 8);
    /// assert_eq!(&texture.rgba[4..], &[255, 255, 255, 255]);
    /// ```
    pub fn from_rgba(width: u32, height: u32, mut rgba: Vec<u8>) -> Self {
        let (width, height) = if width == 0
            || height == 0
            || width > Self::MAX_DIMENSION
            || height > Self::MAX_DIMENSION
        {
            log::warn!("unusable texture size {width}x{height}, using a 1x1 placeholder");
            rgba.clear();
            (1, 1)
        } else {
            (width, height)
        };
        let len = pixel_bytes(width, height);
        if rgba.len() != len {
            log::warn!(
                "texture data is {} bytes, expected {len} for {width}x{height}",
                rgba.len()
            );
            rgba.resize(len, 255);
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    /// A single pixel of one colour.
    pub fn solid(color: [u8; 4]) -> Self {
        Self::from_rgba(1, 1, color.to_vec())
    }

    /// A `size`×`size` checkerboard with `cells` squares per side, starting
    /// with `a` in the top-left corner.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::TextureData;
    ///
    /// let board = TextureData::checkerboard(64, 8, [0, 0, 0, 255], [255; 4]);
    /// assert_eq!((board.width, board.height), (64, 64));
    /// ```
    pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        if size > Self::MAX_DIMENSION {
            return Self::from_rgba(size, size, Vec::new());
        }
        let cell = (size / cells.max(1)).max(1);
        let mut rgba = Vec::with_capacity(pixel_bytes(size, size));
        for y in 0..size {
            for x in 0..size {
                let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                rgba.extend_from_slice(&color);
            }
        }
        Self::from_rgba(size, size, rgba)
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }
}

fn pixel_bytes(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// A shared, cheaply cloned reference to texture data.
///
/// Two handles are the same texture only if they were cloned from one
/// another; equal pixel data in separate handles is still two textures.
#[derive(Clone, Debug)]
pub struct Texture(Rc<TextureData>);

impl Texture {
    /// A new texture identity owning `data`.
    pub fn new(data: TextureData) -> Self {
        Self(Rc::new(data))
    }

    /// The pixels uploaded when an object using this texture commits.
    pub fn data(&self) -> &TextureData {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// Whether both handles share one texture identity.
    ///
    /// # Example
    ///
    /// ```
    /// use tessera::{Texture, TextureData};
    ///
    /// let a = Texture::new(TextureData::solid([255, 0, 0, 255]));
    /// assert!(a.same_as(&a.clone()));
    /// assert!(!a.same_as(&Texture::new(TextureData::solid([255, 0, 0, 255]))));
    /// ```
    pub fn same_as(&self, other: &Texture) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<TextureData> for Texture {
    fn from(data: TextureData) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_data_is_padded_with_white() {
        let t = TextureData::from_rgba(2, 1, vec![0, 0, 0, 255]);
        assert_eq!(t.rgba, vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn zero_size_becomes_placeholder_pixel() {
        let t = TextureData::from_rgba(0, 8, Vec::new());
        assert_eq!((t.width, t.height), (1, 1));
        assert_eq!(t.byte_len(), 4);
    }

    #[test]
    fn checkerboard_alternates() {
        let black = [0, 0, 0, 255];
        let white = [255; 4];
        let t = TextureData::checkerboard(4, 2, black, white);
        assert_eq!(t.byte_len(), 64);
        assert_eq!(&t.rgba[0..4], &black);
        assert_eq!(&t.rgba[8..12], &white);
        // Third row starts a new cell row.
        assert_eq!(&t.rgba[32..36], &white);
    }

    #[test]
    fn oversized_dimensions_become_placeholder_pixel() {
        let t = TextureData::from_rgba(40_000, 40_000, Vec::new());
        assert_eq!((t.width, t.height), (1, 1));
        assert_eq!(t.rgba, vec![255; 4]);

        let wide = TextureData::from_rgba(u32::MAX, 2, vec![0; 16]);
        assert_eq!(wide.byte_len(), 4);

        let board = TextureData::checkerboard(100_000, 4, [0; 4], [255; 4]);
        assert_eq!((board.width, board.height), (1, 1));
    }

    #[test]
    fn largest_allowed_dimension_is_kept() {
        let t = TextureData::from_rgba(TextureData::MAX_DIMENSION, 1, Vec::new());
        assert_eq!(t.width, TextureData::MAX_DIMENSION);
        assert_eq!(t.byte_len(), TextureData::MAX_DIMENSION as usize * 4);
    }

    #[test]
    fn handle_identity_is_by_reference() {
        let a = Texture::new(TextureData::solid([1, 2, 3, 4]));
        let b = a.clone();
        let c = Texture::new(TextureData::solid([1, 2, 3, 4]));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert_eq!(a.width(), 1);
    }
}
