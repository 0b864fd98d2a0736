/// Units which are simply type aliases for `f32` rather than having an
/// implementation as a `uom` `Quantity`.
///
/// The numerical kernels (projectors, filters) work on raw `f32` buffers in
/// mm, so these aliases only serve as clues in the source as to what the
/// numbers represent.

pub type Lengthf32    = f32;
pub type Ratiof32     = f32;
pub type Intensityf32 = f32; // TODO uom Intensity
pub type Weightf32    = f32;
/// Spatial frequency in cycles per mm
pub type Frequencyf32 = f32;
