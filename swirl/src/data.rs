// Common geometries

pub const POSITION_LOCATION: u32 = 0;

#[rustfmt::skip]
pub static PLANE_VERTICES: [f32; 8] = [
    -1.0, -1.0,
    -1.0,  1.0,
     1.0,  1.0,
     1.0, -1.0,
];

#[rustfmt::skip]
pub static PLANE_INDICES: [u16; 6] = [
    0, 1, 2,
    0, 2, 3,
];
