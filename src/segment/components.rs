use image::{ImageBuffer, Luma};

use crate::types::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ComponentStats {
    pub bbox: BoundingBox,
    pub area: u32,
    sum_x: u64,
    sum_y: u64,
}

impl ComponentStats {
    fn new(x: u32, y: u32) -> Self {
        Self {
            bbox: BoundingBox::new(x, x + 1, y, y + 1),
            area: 0,
            sum_x: 0,
            sum_y: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.bbox.x0 = self.bbox.x0.min(x);
        self.bbox.x1 = self.bbox.x1.max(x + 1);
        self.bbox.y0 = self.bbox.y0.min(y);
        self.bbox.y1 = self.bbox.y1.max(y + 1);
        self.area += 1;
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
    }

    pub fn centroid(&self) -> (f32, f32) {
        let n = self.area.max(1) as f32;
        (self.sum_x as f32 / n, self.sum_y as f32 / n)
    }
}

/// Bounding box, pixel count and centroid for every non-zero label, in label order.
pub(crate) fn component_stats(labels: &ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<ComponentStats> {
    let mut stats: Vec<Option<ComponentStats>> = Vec::new();

    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel[0] as usize;
        if label == 0 {
            continue;
        }
        if stats.len() < label {
            stats.resize(label, None);
        }
        stats[label - 1]
            .get_or_insert_with(|| ComponentStats::new(x, y))
            .add(x, y);
    }

    stats.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::region_labelling::{Connectivity, connected_components};

    #[test]
    fn stats_of_two_blobs() {
        let mut mask = image::GrayImage::new(20, 10);
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2), (10, 5), (11, 6)] {
            mask.put_pixel(x, y, Luma([255]));
        }

        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let stats = component_stats(&labels);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].bbox, BoundingBox::new(1, 3, 1, 3));
        assert_eq!(stats[0].area, 4);
        assert_eq!(stats[0].centroid(), (1.5, 1.5));
        assert_eq!(stats[1].bbox, BoundingBox::new(10, 12, 5, 7));
        assert_eq!(stats[1].area, 2);
    }
}
