//! Raster rendering for the map layers.

use crate::presenter::ColorRamp;
use crate::raster::MaskedRaster;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use ndarray::ArrayView2;

/// Map a reflectance to 0..255 on a linear stretch from 0 to `max`.
///
/// Missing data (NaN) renders black.
fn stretch(value: f64, max: f64) -> u8 {
    if !value.is_finite() || max <= 0.0 {
        return 0;
    }
    ((value / max).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// False-colour composite of three equally shaped bands.
///
/// # Panics
/// Panics if the bands differ in shape.
pub fn composite_image(
    red: ArrayView2<f64>,
    green: ArrayView2<f64>,
    blue: ArrayView2<f64>,
    max: f64,
) -> RgbImage {
    assert_eq!(red.dim(), green.dim(), "composite bands must share a shape");
    assert_eq!(red.dim(), blue.dim(), "composite bands must share a shape");

    let (height, width) = red.dim();
    let mut img = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            img.put_pixel(
                x as u32,
                y as u32,
                Rgb([
                    stretch(red[[y, x]], max),
                    stretch(green[[y, x]], max),
                    stretch(blue[[y, x]], max),
                ]),
            );
        }
    }
    img
}

/// Detection overlay: present pixels coloured on `ramp` between `min` and
/// `max`, absent pixels fully transparent.
pub fn overlay_image(intensity: &MaskedRaster, ramp: &ColorRamp, min: f64, max: f64) -> RgbaImage {
    let (height, width) = intensity.dim();
    let mut img = RgbaImage::new(width as u32, height as u32);
    for ((y, x), value) in intensity.iter_valid() {
        let [r, g, b] = ramp.color_at(value, min, max);
        img.put_pixel(x as u32, y as u32, Rgba([r, g, b, 255]));
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_composite_stretch() {
        let red = array![[0.0, 3500.0], [7000.0, f64::NAN]];
        let green = array![[1750.0, 0.0], [0.0, 0.0]];
        let blue = array![[0.0, 0.0], [-5.0, 0.0]];

        let img = composite_image(red.view(), green.view(), blue.view(), 3500.0);
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 128, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(0, 1), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(1, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_overlay_transparency() {
        let raster = MaskedRaster::from_options(&array![[Some(1.0), None, Some(2.0)]]);
        let img = overlay_image(&raster, &ColorRamp::detection(), 1.0, 1.5);

        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(img.get_pixel(1, 0)[3], 0);
        assert_eq!(img.get_pixel(2, 0), &Rgba([255, 0, 0, 255]));
    }
}
