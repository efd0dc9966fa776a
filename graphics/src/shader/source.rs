//! Multi-stage shader text.
//!
//! A shader file holds every stage of one program. A line containing
//! `#shader` together with `vertex`, `fragment` or `geometry` starts that
//! stage; every other line belongs to the stage opened last. Text before the
//! first marker is ignored.

use crate::error::GraphicsError;
use crate::types::ShaderStage;

/// Per-stage sources split out of one shader file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub geometry: Option<String>,
}

impl ShaderSource {
    /// Split `text` at its `#shader` markers.
    pub fn parse(text: &str) -> Self {
        let mut source = Self::default();
        let mut current: Option<ShaderStage> = None;

        for line in text.lines() {
            if line.contains("#shader") {
                // An unrecognised marker keeps the current stage.
                if let Some(stage) = Self::marker_stage(line) {
                    current = Some(stage);
                    source.stage_mut(stage).get_or_insert_with(String::new);
                }
                continue;
            }
            if let Some(stage) = current {
                let buffer = source.stage_mut(stage).get_or_insert_with(String::new);
                buffer.push_str(line);
                buffer.push('\n');
            }
        }
        source
    }

    /// Build from explicit stage sources.
    pub fn from_stages(vertex: &str, fragment: &str, geometry: Option<&str>) -> Self {
        Self {
            vertex: Some(vertex.to_string()),
            fragment: Some(fragment.to_string()),
            geometry: geometry.map(str::to_string),
        }
    }

    /// Stages in compile order.
    ///
    /// Fails if the vertex or fragment stage is missing.
    pub fn stages(&self) -> Result<Vec<(ShaderStage, &str)>, GraphicsError> {
        let vertex = self.vertex.as_deref().ok_or_else(|| {
            GraphicsError::InvalidParameter("shader source has no vertex stage".to_string())
        })?;
        let fragment = self.fragment.as_deref().ok_or_else(|| {
            GraphicsError::InvalidParameter("shader source has no fragment stage".to_string())
        })?;

        let mut stages = vec![(ShaderStage::Vertex, vertex)];
        if let Some(geometry) = self.geometry.as_deref() {
            stages.push((ShaderStage::Geometry, geometry));
        }
        stages.push((ShaderStage::Fragment, fragment));
        Ok(stages)
    }

    fn marker_stage(line: &str) -> Option<ShaderStage> {
        if line.contains("vertex") {
            Some(ShaderStage::Vertex)
        } else if line.contains("fragment") {
            Some(ShaderStage::Fragment)
        } else if line.contains("geometry") {
            Some(ShaderStage::Geometry)
        } else {
            None
        }
    }

    fn stage_mut(&mut self, stage: ShaderStage) -> &mut Option<String> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
            ShaderStage::Geometry => &mut self.geometry,
        }
    }
}
