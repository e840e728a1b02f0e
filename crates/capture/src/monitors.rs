use std::fmt;

/// One output as reported by the window system, in virtual-screen coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalOutput {
    pub name: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for PhysicalOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}): x={} y={} width={} height={}",
            self.name.as_deref().unwrap_or("unnamed"),
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

/// A captured sub-rectangle assigned a dense index at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorDescriptor {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorRegistry {
    monitors: Vec<MonitorDescriptor>,
}

impl MonitorRegistry {
    /// Copies every output except `exclude` and renumbers them from 0.
    pub fn from_outputs(outputs: &[PhysicalOutput], exclude: Option<usize>) -> Self {
        let monitors = outputs
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != exclude)
            .enumerate()
            .map(|(index, (_, output))| MonitorDescriptor {
                x: output.x,
                y: output.y,
                width: output.width,
                height: output.height,
                index,
            })
            .collect();
        Self { monitors }
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MonitorDescriptor> {
        self.monitors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitorDescriptor> + '_ {
        self.monitors.iter()
    }
}

/// Size of the bounding box that covers every output, anchored at the origin.
pub fn virtual_screen_size(outputs: &[PhysicalOutput]) -> (u32, u32) {
    let width = outputs
        .iter()
        .map(|o| (i64::from(o.x) + i64::from(o.width)).max(0))
        .max()
        .unwrap_or(0);
    let height = outputs
        .iter()
        .map(|o| (i64::from(o.y) + i64::from(o.height)).max(0))
        .max()
        .unwrap_or(0);
    (
        u32::try_from(width).unwrap_or(u32::MAX),
        u32::try_from(height).unwrap_or(u32::MAX),
    )
}
