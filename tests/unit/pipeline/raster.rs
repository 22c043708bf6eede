use super::*;

#[derive(Debug, PartialEq)]
struct Grid {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
    writes: usize,
}

impl PixelSurface for Grid {
    fn create(width: u32, height: u32) -> Self {
        Grid {
            width,
            height,
            pixels: vec![[9, 9, 9]; (width * height) as usize],
            writes: 0,
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        self.pixels[(x + y * self.width) as usize] = rgb;
        self.writes += 1;
    }
}

#[test]
fn draws_every_pixel_as_gray() {
    let field = ResultField::new(3, 2, vec![10, 20, 30, 40, 50, 60]).unwrap();
    let mut grid = Grid::create(3, 2);
    draw(&field, RowStride::Width, &mut grid).unwrap();
    assert_eq!(grid.writes, 6);
    assert_eq!(grid.pixels[0], [10, 10, 10]);
    assert_eq!(grid.pixels[5], [60, 60, 60]);
    assert!(grid.pixels.iter().all(|p| p[0] == p[1] && p[1] == p[2]));
}

#[test]
fn height_stride_is_the_default_mapping() {
    // 3 wide, 2 tall: (0, 1) reads index 0 + 1 * 2 = 2.
    let field = ResultField::new(3, 2, vec![10, 20, 30, 40, 50, 60]).unwrap();
    let mut grid = Grid::create(3, 2);
    draw(&field, RowStride::default(), &mut grid).unwrap();
    assert_eq!(grid.pixels[3], [30, 30, 30]);
}

#[test]
fn mismatched_surface_is_left_untouched() {
    let field = ResultField::new(2, 2, vec![1; 4]).unwrap();
    let mut grid = Grid::create(3, 2);
    let before = grid.pixels.clone();
    assert!(draw(&field, RowStride::Width, &mut grid).is_err());
    assert_eq!(grid.writes, 0);
    assert_eq!(grid.pixels, before);
}

#[test]
fn rgb_image_surface_round_trips_pixels() {
    let field = ResultField::new(2, 1, vec![7, 200]).unwrap();
    let mut img = <image::RgbImage as PixelSurface>::create(2, 1);
    draw(&field, RowStride::Width, &mut img).unwrap();
    assert_eq!(img.get_pixel(1, 0).0, [200, 200, 200]);
}
