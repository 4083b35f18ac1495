//! Channel order conversion.

/// Swap blue and red of every BGRA pixel, leaving alpha untouched.
///
/// A trailing partial pixel is left as is.
pub fn bgra_to_rgba_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_blue_and_red() {
        let mut data = [1, 2, 3, 4, 10, 20, 30, 40];
        bgra_to_rgba_in_place(&mut data);
        assert_eq!(data, [3, 2, 1, 4, 30, 20, 10, 40]);
    }

    #[test]
    fn test_ignores_partial_pixel() {
        let mut data = [1, 2, 3, 4, 5, 6];
        bgra_to_rgba_in_place(&mut data);
        assert_eq!(data, [3, 2, 1, 4, 5, 6]);
    }
}
