use std::fmt;

/// `[start:stride:stop]`, inclusive of `stop` as in DAP2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hyperslab {
    pub start: usize,
    pub stride: usize,
    pub stop: usize,
}

impl Hyperslab {
    pub fn index(index: usize) -> Self {
        Hyperslab {
            start: index,
            stride: 1,
            stop: index,
        }
    }

    /// The whole extent of a dimension of `size` (which must be non-zero).
    pub fn full(size: usize) -> Self {
        Hyperslab {
            start: 0,
            stride: 1,
            stop: size.saturating_sub(1),
        }
    }

    pub fn len(&self) -> usize {
        if self.stop < self.start || self.stride == 0 {
            0
        } else {
            (self.stop - self.start) / self.stride + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..self.len()).map(move |k| self.start + k * self.stride)
    }
}

impl fmt::Display for Hyperslab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}:{}]", self.start, self.stride, self.stop)
    }
}

/// One projected variable of a constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub name: String,
    pub slabs: Vec<Hyperslab>,
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for slab in &self.slabs {
            write!(f, "{}", slab)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraint {
    pub projections: Vec<Projection>,
}

impl Constraint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, name: impl Into<String>, slabs: Vec<Hyperslab>) -> Self {
        self.projections.push(Projection {
            name: name.into(),
            slabs,
        });
        self
    }

    /// Query-string form. Brackets are percent-encoded because several
    /// servers reject them raw.
    pub fn to_query(&self) -> String {
        self.to_string()
            .replace('[', "%5B")
            .replace(']', "%5D")
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.projections.iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}
