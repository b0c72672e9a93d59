use rayon::prelude::*;

use crate::error::CdtError;

/// Segments per axis; the lookup holds `SEGMENTS * SEGMENTS` rows.
pub const SEGMENTS: u32 = 4;
/// Histogram bins per segment; one lookup texel per bin.
pub const BINS: usize = 256;
/// Lookup texture width in texels.
pub const LOOKUP_WIDTH: u32 = BINS as u32;
/// Lookup texture height in texels.
pub const LOOKUP_HEIGHT: u32 = SEGMENTS * SEGMENTS;
/// Byte length of the RGBA lookup buffer.
pub const LOOKUP_LEN: usize = BINS * (LOOKUP_HEIGHT as usize) * 4;

const CLIP_LIMIT: f32 = 1.25;
const VALUE_CHANNEL: usize = 2;

/// Computes the contrast-limited per-segment CDT lookup for an HSV readback.
///
/// `hsv` is tightly packed RGBA8 with hue, saturation and value in the first
/// three channels. The image is split into a 4x4 grid; each cell gets a
/// 256-bin histogram of the value channel, clipped at 1.25x the mean bin
/// count with the excess spread evenly, then integrated into a cumulative
/// distribution scaled to 0..=255.
///
/// Output row `segment` (row-major over the grid) holds per texel:
/// `r` = cdf at that bin, `g` = cdf at the first non-empty bin,
/// `b` = cdf at bin 255, `a` = 255.
pub fn compute_cdt(hsv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CdtError> {
    if width == 0 || height == 0 {
        return Err(CdtError::EmptyImage { width, height });
    }
    let expected = (width as usize) * (height as usize) * 4;
    if hsv.len() != expected {
        return Err(CdtError::BufferSize {
            expected,
            actual: hsv.len(),
        });
    }

    let segment_count = (SEGMENTS * SEGMENTS) as usize;
    let mut histograms: Vec<u32> = Vec::new();
    histograms.try_reserve_exact(segment_count * BINS)?;
    histograms.resize(segment_count * BINS, 0);

    // Each band of grid rows owns a disjoint slice of histograms.
    let row_bytes = width as usize * 4;
    histograms
        .par_chunks_mut(SEGMENTS as usize * BINS)
        .enumerate()
        .for_each(|(band, hist)| {
            for y in 0..height {
                if segment_index(y, height) != band {
                    continue;
                }
                let row = &hsv[y as usize * row_bytes..(y as usize + 1) * row_bytes];
                for (x, px) in row.chunks_exact(4).enumerate() {
                    let column = segment_index(x as u32, width);
                    hist[column * BINS + px[VALUE_CHANNEL] as usize] += 1;
                }
            }
        });

    let tile_area =
        (((width / SEGMENTS) as u64) * ((height / SEGMENTS) as u64)).max(1);
    let clip_limit = ((CLIP_LIMIT * tile_area as f32 / BINS as f32) as u32).max(1);

    let mut lookup: Vec<u8> = Vec::new();
    lookup.try_reserve_exact(LOOKUP_LEN)?;
    lookup.resize(LOOKUP_LEN, 0);

    lookup
        .par_chunks_mut(BINS * 4)
        .zip(histograms.par_chunks_mut(BINS))
        .for_each(|(row, hist)| {
            clip_histogram(hist, clip_limit);
            let cdf = cumulative(hist, tile_area);
            let min_index = hist.iter().position(|&count| count != 0).unwrap_or(BINS - 1);
            let cdf_min = cdf[min_index];
            let cdf_max = cdf[BINS - 1];
            for (texel, value) in row.chunks_exact_mut(4).zip(cdf.iter()) {
                texel[0] = *value;
                texel[1] = cdf_min;
                texel[2] = cdf_max;
                texel[3] = 255;
            }
        });

    Ok(lookup)
}

fn segment_index(coord: u32, extent: u32) -> usize {
    ((coord as u64 * SEGMENTS as u64) / extent as u64) as usize
}

fn clip_histogram(hist: &mut [u32], clip_limit: u32) {
    let mut clipped = 0u32;
    for count in hist.iter_mut() {
        if *count > clip_limit {
            clipped += *count - clip_limit;
            *count = clip_limit;
        }
    }
    let batch = clipped / BINS as u32;
    let residual = (clipped - batch * BINS as u32) as usize;
    for (i, count) in hist.iter_mut().enumerate() {
        *count += batch;
        if i < residual {
            *count += 1;
        }
    }
}

fn cumulative(hist: &[u32], tile_area: u64) -> [u8; BINS] {
    let mut out = [0u8; BINS];
    let Some(start) = hist.iter().position(|&count| count != 0) else {
        return out;
    };
    let mut running = 0u64;
    for (slot, &count) in out[start..].iter_mut().zip(&hist[start..]) {
        running += count as u64;
        *slot = (running * 255 / tile_area).min(255) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hsv_from_values(width: u32, height: u32, value: impl Fn(u32, u32) -> u8) -> Vec<u8> {
        let mut buf = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                buf.extend_from_slice(&[0, 0, value(x, y), 255]);
            }
        }
        buf
    }

    fn segment_row(lookup: &[u8], segment: usize) -> &[u8] {
        &lookup[segment * BINS * 4..(segment + 1) * BINS * 4]
    }

    #[test]
    fn rejects_empty_and_mismatched_buffers() {
        assert!(matches!(
            compute_cdt(&[], 0, 4),
            Err(CdtError::EmptyImage { .. })
        ));
        assert!(matches!(
            compute_cdt(&[0; 12], 2, 2),
            Err(CdtError::BufferSize {
                expected: 16,
                actual: 12
            })
        ));
    }

    #[test]
    fn output_shape_and_alpha() {
        let hsv = hsv_from_values(32, 24, |x, y| ((x * 5 + y * 3) % 256) as u8);
        let lookup = compute_cdt(&hsv, 32, 24).unwrap();
        assert_eq!(lookup.len(), LOOKUP_LEN);
        assert!(lookup.chunks_exact(4).all(|texel| texel[3] == 255));
    }

    #[test]
    fn cdf_is_monotone_and_saturates() {
        let hsv = hsv_from_values(64, 64, |x, y| ((x * 7 + y * 13) % 256) as u8);
        let lookup = compute_cdt(&hsv, 64, 64).unwrap();
        for segment in 0..16 {
            let row = segment_row(&lookup, segment);
            let cdf: Vec<u8> = row.chunks_exact(4).map(|t| t[0]).collect();
            assert!(cdf.windows(2).all(|w| w[0] <= w[1]), "segment {segment}");
            assert_eq!(cdf[255], 255, "segment {segment}");
            assert!(row.chunks_exact(4).all(|t| t[2] == 255));
        }
    }

    #[test]
    fn uniform_image_spreads_clipped_mass() {
        // Every pixel lands in bin 100, so clipping pushes most of the mass
        // into the other bins and the cdf starts at bin 0.
        let hsv = hsv_from_values(16, 16, |_, _| 100);
        let lookup = compute_cdt(&hsv, 16, 16).unwrap();
        let row = segment_row(&lookup, 5);
        let cdf: Vec<u8> = row.chunks_exact(4).map(|t| t[0]).collect();
        assert_eq!(cdf[255], 255);
        assert!(cdf[99] < cdf[100]);
        assert_eq!(row[1], cdf[0]);
    }

    #[test]
    fn segments_are_independent() {
        // Left half dark, right half bright.
        let hsv = hsv_from_values(64, 64, |x, _| if x < 32 { 20 } else { 220 });
        let lookup = compute_cdt(&hsv, 64, 64).unwrap();
        let left = segment_row(&lookup, 0);
        let right = segment_row(&lookup, 3);
        let left_mid = left[128 * 4];
        let right_mid = right[128 * 4];
        assert!(left_mid > right_mid);
    }

    #[test]
    fn tiny_images_do_not_divide_by_zero() {
        let hsv = hsv_from_values(3, 2, |x, _| (x * 80) as u8);
        let lookup = compute_cdt(&hsv, 3, 2).unwrap();
        assert_eq!(lookup.len(), LOOKUP_LEN);
        assert_eq!(segment_row(&lookup, 0)[0], 255);
        // Column 3 of the grid receives no pixels at this width.
        assert!(segment_row(&lookup, 3).chunks_exact(4).all(|t| t[0] == 0));
    }

    #[test]
    fn clipping_preserves_total_count() {
        let mut hist = vec![0u32; BINS];
        hist[10] = 1000;
        hist[20] = 3;
        clip_histogram(&mut hist, 5);
        assert_eq!(hist.iter().sum::<u32>(), 1003);
        assert!(hist[0] >= hist[255]);
    }
}
