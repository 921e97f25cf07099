use proptest::prelude::*;
use sam_canvas::rle::{self, ScanOrder};
use sam_canvas::transform::{ClientRect, CoordinateTransform};
use sam_canvas::BinaryMask;

fn mask_strategy() -> impl Strategy<Value = BinaryMask> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        prop::collection::vec(0u8..2, (w * h) as usize)
            .prop_map(move |data| BinaryMask::new(w, h, data).unwrap())
    })
}

proptest! {
    #[test]
    fn test_row_major_round_trip(mask in mask_strategy()) {
        let encoded = rle::encode(&mask);
        let decoded = rle::decode(&encoded, mask.height(), mask.width()).unwrap();
        prop_assert_eq!(decoded, mask);
    }

    #[test]
    fn test_column_major_round_trip(mask in mask_strategy()) {
        let encoded = rle::encode_with(&mask, ScanOrder::ColumnMajor);
        let decoded = rle::decode_with(&encoded, mask.height(), mask.width(), ScanOrder::ColumnMajor).unwrap();
        prop_assert_eq!(decoded, mask);
    }

    #[test]
    fn test_counts_cover_every_pixel(mask in mask_strategy()) {
        for order in [ScanOrder::RowMajor, ScanOrder::ColumnMajor] {
            let encoded = rle::encode_with(&mask, order);
            let total: u64 = encoded.counts.iter().map(|&c| c as u64).sum();
            prop_assert_eq!(total, mask.width() as u64 * mask.height() as u64);
            prop_assert_eq!(encoded.size, [mask.height(), mask.width()]);
        }
    }

    #[test]
    fn test_area_matches_mask(mask in mask_strategy()) {
        let encoded = rle::encode(&mask);
        prop_assert_eq!(encoded.area(), mask.area());
        prop_assert_eq!(encoded.bbox(), mask.bbox());
    }

    #[test]
    fn test_compressed_counts_round_trip(counts in prop::collection::vec(0u32..100_000, 0..64)) {
        let s = rle::counts_to_string(&counts);
        prop_assert_eq!(rle::counts_from_string(&s).unwrap(), counts);
    }

    #[test]
    fn test_coordinate_round_trip(
        (w, h, x, y) in (1u32..2000, 1u32..2000).prop_flat_map(|(w, h)| (Just(w), Just(h), 0.0f32..w as f32, 0.0f32..h as f32)),
        scale in 0.05f32..1.0,
    ) {
        let transform = CoordinateTransform::with_scale(w, h, scale);
        let (cw, ch) = transform.canvas_size();
        prop_assume!(cw > 0 && ch > 0);
        let rect = ClientRect::new(0.0, 0.0, cw as f32, ch as f32);
        let display = transform.to_display(x, y);
        let back = transform.to_original(display.x, display.y, &rect);
        prop_assert!((back.x - x).abs() < 1e-2, "x {} -> {}", x, back.x);
        prop_assert!((back.y - y).abs() < 1e-2, "y {} -> {}", y, back.y);
    }
}
