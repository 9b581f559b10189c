use crate::types::BoundingBox;

/// Joins boxes that overlap horizontally (or sit within `x_gap` of each other)
/// and whose facing vertical edges are closer than `y_gap`. Each box is merged
/// into the group of the first unused box it is close to.
pub fn merge_boxes(boxes: &[BoundingBox], x_gap: i64, y_gap: i64) -> Vec<BoundingBox> {
    let mut used = vec![false; boxes.len()];
    let mut merged = Vec::new();

    for (i, a) in boxes.iter().enumerate() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut group = *a;

        for (j, b) in boxes.iter().enumerate() {
            if used[j] {
                continue;
            }
            let x_close = a.x_overlap(b) > -x_gap;
            let y_dist = (i64::from(a.y1) - i64::from(b.y0))
                .abs()
                .min((i64::from(b.y1) - i64::from(a.y0)).abs());
            if x_close && y_dist < y_gap {
                used[j] = true;
                group = group.union(b);
            }
        }
        merged.push(group);
    }
    merged
}

/// Drops every box that lies inside a strictly larger box (within `epsilon`).
pub fn filter_contained_boxes(boxes: &[BoundingBox], epsilon: u32) -> Vec<BoundingBox> {
    boxes
        .iter()
        .enumerate()
        .filter(|(i, inner)| {
            !boxes.iter().enumerate().any(|(j, outer)| {
                *i != j && inner.is_inside(outer, epsilon) && outer.area() > inner.area()
            })
        })
        .map(|(_, b)| *b)
        .collect()
}

/// Groups boxes into text lines. Boxes are visited top to bottom; each joins the
/// first line whose lowest bottom edge is within `line_gap` of its top edge.
/// Returns indices into `boxes`, one `Vec` per line, each sorted left to right.
pub fn group_into_lines(boxes: &[BoundingBox], line_gap: u32) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by_key(|&i| boxes[i].y0);

    let mut lines: Vec<(u32, Vec<usize>)> = Vec::new();
    for i in order {
        let b = boxes[i];
        match lines
            .iter_mut()
            .find(|(bottom, _)| b.y0 <= bottom + line_gap)
        {
            Some((bottom, members)) => {
                *bottom = (*bottom).max(b.y1);
                members.push(i);
            }
            None => lines.push((b.y1, vec![i])),
        }
    }

    lines
        .into_iter()
        .map(|(_, mut members)| {
            members.sort_by_key(|&i| boxes[i].x0);
            members
        })
        .collect()
}

/// Within one line, merges glyph boxes whose horizontal overlap reaches
/// `overlap` times the narrower width. Result is sorted left to right.
pub fn cluster_line(boxes: &[BoundingBox], overlap: f32) -> Vec<BoundingBox> {
    if boxes.len() <= 1 {
        return boxes.to_vec();
    }

    let mut used = vec![false; boxes.len()];
    let mut merged = Vec::new();

    for start in 0..boxes.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut group = boxes[start];
        let mut stack = vec![start];

        while let Some(k) = stack.pop() {
            let current = boxes[k];
            for (j, other) in boxes.iter().enumerate() {
                if used[j] {
                    continue;
                }
                let shared = current.x_overlap(other).max(0) as f32;
                let narrower = current.width().min(other.width()) as f32;
                if shared >= narrower * overlap {
                    used[j] = true;
                    stack.push(j);
                    group = group.union(other);
                }
            }
        }
        merged.push(group);
    }

    merged.sort_by_key(|b| b.x0);
    merged
}
