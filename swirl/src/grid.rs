/// The size of a simulation field.
///
/// Fields keep the aspect ratio of the surface. The reference resolution sets
/// the short side and the long side follows the surface's longer axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn from_reference(reference: u32, surface_width: u32, surface_height: u32) -> Self {
        let width = surface_width.max(1) as f32;
        let height = surface_height.max(1) as f32;

        let mut aspect_ratio = width / height;
        if aspect_ratio < 1.0 {
            aspect_ratio = 1.0 / aspect_ratio;
        }

        let reference = reference as f32;
        let short_side = reference.round().max(1.0) as u32;
        let long_side = (reference * aspect_ratio).round().max(1.0) as u32;

        if surface_width > surface_height {
            Self {
                width: long_side,
                height: short_side,
            }
        } else {
            Self {
                width: short_side,
                height: long_side,
            }
        }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}
