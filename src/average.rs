//! Block averaging over a grayscale grid.

use image::GrayImage;

/// Mean intensity of the `size`×`size` block whose top-left sample is at
/// (`row`, `col`), clipped to the image bounds.
///
/// The mean is truncated (`sum / count` in integer arithmetic). A block that
/// clips to nothing averages to 0; callers are expected to pass an origin
/// inside the image.
pub fn block_average(image: &GrayImage, row: u32, col: u32, size: u32) -> u8 {
    debug_assert!(
        row < image.height() && col < image.width(),
        "block origin ({row}, {col}) outside {}x{} image",
        image.width(),
        image.height()
    );

    let row_end = row.saturating_add(size).min(image.height());
    let col_end = col.saturating_add(size).min(image.width());

    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for y in row..row_end {
        for x in col..col_end {
            sum += image.get_pixel(x, y).0[0] as u64;
            count += 1;
        }
    }

    if count == 0 {
        0
    } else {
        (sum / count) as u8
    }
}
