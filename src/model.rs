use crate::pipeline::Pipeline;

/// The input of a draw call: vertex, instance and index data for a pipeline.
///
/// Every three indices form a triangle. With more than one instance, the whole index list is drawn once per instance
/// and instance `i` sees the vertex outputs `i * vertices.len()..(i + 1) * vertices.len()`.
pub struct Model<'a, P: Pipeline> {
    pub vertices: &'a [P::Vertex],
    /// Per-instance data. Either empty or exactly one entry per instance.
    pub instances: &'a [P::Instance],
    pub indices: &'a [u32],
    pub instance_count: usize,
    pub constants: &'a P::Constants,
    /// The pipeline to draw with. When absent, the pipeline bound to the rasterizer is used.
    pub pipeline: Option<&'a P>,
}

impl<'a, P: Pipeline> Model<'a, P> {
    /// A single instance of an indexed triangle list.
    pub fn new(vertices: &'a [P::Vertex], indices: &'a [u32], constants: &'a P::Constants) -> Self {
        Self {
            vertices,
            instances: &[],
            indices,
            instance_count: 1,
            constants,
            pipeline: None,
        }
    }

    /// Draw one instance per entry of `instances`.
    pub fn with_instances(self, instances: &'a [P::Instance]) -> Self {
        Self {
            instances,
            instance_count: instances.len(),
            ..self
        }
    }

    /// Draw `count` instances without per-instance data.
    pub fn with_instance_count(self, count: usize) -> Self {
        Self {
            instances: &[],
            instance_count: count,
            ..self
        }
    }

    pub fn with_pipeline(self, pipeline: &'a P) -> Self {
        Self {
            pipeline: Some(pipeline),
            ..self
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles drawn per instance.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that the model describes a drawable triangle list.
    ///
    /// # Panics
    ///
    /// Panics if the index count is not a multiple of 3, an index is out of range, or the instance data does not
    /// match the instance count.
    pub fn validate(&self) {
        assert_eq!(
            self.indices.len() % 3,
            0,
            "Index count {} is not a multiple of 3",
            self.indices.len(),
        );
        assert!(
            self.instances.is_empty() || self.instances.len() == self.instance_count,
            "Model has {} instances but {} entries of instance data",
            self.instance_count,
            self.instances.len(),
        );
        if let Some(&max) = self.indices.iter().max() {
            assert!(
                (max as usize) < self.vertices.len(),
                "Index {} is out of range of {} vertices",
                max,
                self.vertices.len(),
            );
        }
    }
}

impl<'a, P: Pipeline> Clone for Model<'a, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, P: Pipeline> Copy for Model<'a, P> {}
