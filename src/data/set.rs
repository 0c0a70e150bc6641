use crate::data::ndarray::NDArray;
use crate::foundation::error::{PointreelError, PointreelResult};

/// Everything needed to render one variation: per-channel positions plus class ids.
#[derive(Clone, Debug)]
pub struct ArraySet {
    /// One `[frames, samples, dims]` array per channel, in channel order.
    pub positions: Vec<NDArray>,
    /// Class id per sample.
    pub class_ids: Vec<u32>,
}

impl ArraySet {
    /// Assemble a set from decoded channel arrays and a 1-D class-id array.
    pub fn from_arrays(positions: Vec<NDArray>, classes: &NDArray) -> PointreelResult<Self> {
        if classes.ndim() != 1 {
            return Err(PointreelError::load(format!(
                "class id array must be 1-D, got shape {:?}",
                classes.shape()
            )));
        }
        let class_ids = classes
            .data()
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                    Ok(v as u32)
                } else {
                    Err(PointreelError::load(format!(
                        "class id of sample {i} is not a non-negative integer: {v}"
                    )))
                }
            })
            .collect::<PointreelResult<Vec<_>>>()?;

        let set = Self {
            positions,
            class_ids,
        };
        set.validate()?;
        Ok(set)
    }

    /// Check shape agreement between channels and class ids.
    pub fn validate(&self) -> PointreelResult<()> {
        let samples = self.class_ids.len();
        for (i, p) in self.positions.iter().enumerate() {
            let shape = p.shape();
            if shape.len() != 3 || shape[2] < 2 {
                return Err(PointreelError::load(format!(
                    "channel {i} positions must have shape [frames, samples, dims>=2], got {shape:?}"
                )));
            }
            if shape[1] != samples {
                return Err(PointreelError::load(format!(
                    "channel {i} has {} samples but {samples} class ids were provided",
                    shape[1]
                )));
            }
        }
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        self.class_ids.len()
    }

    /// Enforce `class_id < class_count` for every sample.
    pub fn check_class_count(&self, class_count: usize) -> PointreelResult<()> {
        match self.class_ids.iter().position(|&c| c as usize >= class_count) {
            Some(i) => Err(PointreelError::load(format!(
                "sample {i} has class id {} but the capture declares {class_count} classes",
                self.class_ids[i]
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/data/set.rs"]
mod tests;
