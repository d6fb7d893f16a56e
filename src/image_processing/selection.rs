use super::geometry::{BoundingBox, DetectionSet};

/// Pick the primary subject: the box with the largest area.
///
/// Ties keep the first box in detector order. Returns `None` for an empty set,
/// which the caller treats as a "no subject" rejection.
pub fn select_subject(detections: &DetectionSet) -> Option<BoundingBox> {
    let mut best: Option<BoundingBox> = None;

    for candidate in detections {
        match best {
            Some(current) if candidate.area() <= current.area() => {}
            _ => best = Some(*candidate),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        assert_eq!(select_subject(&DetectionSet::new()), None);
    }

    #[test]
    fn test_single_box_is_selected() {
        let subject = bbox(800.0, 400.0, 1200.0, 900.0);
        let set: DetectionSet = vec![subject].into();
        assert_eq!(select_subject(&set), Some(subject));
    }

    #[test]
    fn test_largest_area_wins() {
        let small = bbox(0.0, 0.0, 10.0, 10.0);
        let large = bbox(50.0, 50.0, 150.0, 250.0);
        let medium = bbox(300.0, 300.0, 400.0, 350.0);
        let set: DetectionSet = vec![small, large, medium].into();
        assert_eq!(select_subject(&set), Some(large));
    }

    #[test]
    fn test_ties_keep_first_encountered() {
        let first = bbox(0.0, 0.0, 20.0, 10.0);
        let second = bbox(100.0, 100.0, 110.0, 120.0);
        let set: DetectionSet = vec![first, second].into();
        assert_eq!(select_subject(&set), Some(first));

        let set: DetectionSet = vec![second, first].into();
        assert_eq!(select_subject(&set), Some(second));
    }
}
