//! Stacking windows into training batches

use crate::error::{Result, WindowError};
use crate::features::FeatureArray;

/// One extracted window ready for batching
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub features: FeatureArray,
    /// Label indices, primary first
    pub labels: Vec<usize>,
    pub clip_id: String,
    pub window_index: usize,
}

/// Stacked features and targets for `k` windows
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Row-major `feature_shape`
    pub features: Vec<f32>,
    /// `[k, ...item shape]`
    pub feature_shape: Vec<usize>,
    /// Multi-hot `[k, num_classes]`
    pub targets: Vec<f32>,
    pub num_classes: usize,
    /// Primary label of each item
    pub class_ids: Vec<usize>,
    pub clip_ids: Vec<String>,
    pub window_indices: Vec<usize>,
}

impl Batch {
    /// Number of items
    pub fn len(&self) -> usize {
        self.clip_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clip_ids.is_empty()
    }

    /// Features of item `i`
    pub fn item_features(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() {
            return None;
        }
        let stride: usize = self.feature_shape[1..].iter().product();
        Some(&self.features[i * stride..(i + 1) * stride])
    }

    /// Target row of item `i`
    pub fn item_targets(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() {
            return None;
        }
        Some(&self.targets[i * self.num_classes..(i + 1) * self.num_classes])
    }
}

/// Stack items in the order given
///
/// Every item must share one feature shape. Labels become multi-hot rows of
/// width `num_classes`; the first label of each item is its class id.
pub fn collate(items: Vec<BatchItem>, num_classes: usize) -> Result<Batch> {
    let item_shape = match items.first() {
        Some(first) => first.features.shape.clone(),
        None => {
            return Ok(Batch {
                features: Vec::new(),
                feature_shape: vec![0],
                targets: Vec::new(),
                num_classes,
                class_ids: Vec::new(),
                clip_ids: Vec::new(),
                window_indices: Vec::new(),
            })
        }
    };

    let k = items.len();
    let stride: usize = item_shape.iter().product();
    let mut features = Vec::with_capacity(k * stride);
    let mut targets = vec![0.0f32; k * num_classes];
    let mut class_ids = Vec::with_capacity(k);
    let mut clip_ids = Vec::with_capacity(k);
    let mut window_indices = Vec::with_capacity(k);

    for (i, item) in items.into_iter().enumerate() {
        if item.features.shape != item_shape {
            return Err(WindowError::ShapeMismatch {
                index: i,
                expected: item_shape,
                found: item.features.shape,
            });
        }
        // fields are public, so the data may not fill its declared shape
        if item.features.data.len() != stride {
            return Err(WindowError::ShapeMismatch {
                index: i,
                expected: item_shape,
                found: vec![item.features.data.len()],
            });
        }
        let primary = match item.labels.first() {
            Some(&label) => label,
            None => return Err(WindowError::integrity(&item.clip_id, "window has no label")),
        };
        for &label in &item.labels {
            if label >= num_classes {
                return Err(WindowError::integrity(
                    &item.clip_id,
                    format!("label {} outside {} classes", label, num_classes),
                ));
            }
            targets[i * num_classes + label] = 1.0;
        }

        features.extend_from_slice(&item.features.data);
        class_ids.push(primary);
        clip_ids.push(item.clip_id);
        window_indices.push(item.window_index);
    }

    let mut feature_shape = Vec::with_capacity(item_shape.len() + 1);
    feature_shape.push(k);
    feature_shape.extend(item_shape);

    Ok(Batch {
        features,
        feature_shape,
        targets,
        num_classes,
        class_ids,
        clip_ids,
        window_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(
        clip_id: &str,
        window_index: usize,
        shape: Vec<usize>,
        fill: f32,
        labels: Vec<usize>,
    ) -> BatchItem {
        let n = shape.iter().product();
        BatchItem {
            features: FeatureArray::new(vec![fill; n], shape).unwrap(),
            labels,
            clip_id: clip_id.to_string(),
            window_index,
        }
    }

    #[test]
    fn test_collate_stacks_in_order() {
        let items = vec![
            item("a", 0, vec![2, 3], 1.0, vec![0]),
            item("a", 1, vec![2, 3], 2.0, vec![0]),
            item("b", 0, vec![2, 3], 3.0, vec![2, 1]),
        ];
        let batch = collate(items, 4).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.feature_shape, vec![3, 2, 3]);
        assert_eq!(batch.features.len(), 18);
        assert_eq!(batch.item_features(1).unwrap(), &[2.0; 6]);
        assert_eq!(batch.item_features(2).unwrap(), &[3.0; 6]);
        assert_eq!(batch.class_ids, vec![0, 0, 2]);
        assert_eq!(batch.clip_ids, vec!["a", "a", "b"]);
        assert_eq!(batch.window_indices, vec![0, 1, 0]);
        assert_eq!(batch.item_targets(0).unwrap(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(batch.item_targets(2).unwrap(), &[0.0, 1.0, 1.0, 0.0]);
        assert!(batch.item_targets(3).is_none());
    }

    #[test]
    fn test_collate_shape_mismatch() {
        let items = vec![
            item("a", 0, vec![4], 0.0, vec![0]),
            item("b", 0, vec![5], 0.0, vec![0]),
        ];
        match collate(items, 1) {
            Err(WindowError::ShapeMismatch { index, expected, found }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, vec![4]);
                assert_eq!(found, vec![5]);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_collate_rejects_data_not_filling_shape() {
        let short = BatchItem {
            features: FeatureArray {
                data: vec![1.0; 3],
                shape: vec![4],
            },
            labels: vec![0],
            clip_id: "a".to_string(),
            window_index: 0,
        };
        let items = vec![short, item("b", 0, vec![4], 2.0, vec![0])];
        match collate(items, 1) {
            Err(WindowError::ShapeMismatch { index, expected, found }) => {
                assert_eq!(index, 0);
                assert_eq!(expected, vec![4]);
                assert_eq!(found, vec![3]);
            }
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_collate_label_out_of_range() {
        let items = vec![item("a", 0, vec![1], 0.0, vec![3])];
        let err = collate(items, 3).unwrap_err();
        assert!(matches!(err, WindowError::DataIntegrity { .. }));
        assert_eq!(err.clip_id(), Some("a"));
    }

    #[test]
    fn test_collate_empty() {
        let batch = collate(Vec::new(), 5).unwrap();
        assert!(batch.is_empty());
        assert!(batch.features.is_empty());
        assert!(batch.item_features(0).is_none());
    }
}
