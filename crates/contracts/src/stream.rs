//! Stream requests and concrete stream profiles.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Pose,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Depth => "depth",
            Self::Color => "color",
            Self::Infrared => "infrared",
            Self::Fisheye => "fisheye",
            Self::Gyro => "gyro",
            Self::Accel => "accel",
            Self::Pose => "pose",
        };
        f.write_str(name)
    }
}

/// Pixel format for image streams, data type for the others
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Unconstrained, only valid inside a request
    #[default]
    Any,
    Z16,
    Y8,
    Y16,
    Yuyv,
    Uyvy,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Mjpeg,
    MotionXyz32f,
    SixDof,
}

impl Format {
    /// Bytes per pixel (or per sample for motion data)
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Any => 0,
            Self::Y8 | Self::Mjpeg => 1,
            Self::Z16 | Self::Y16 | Self::Yuyv | Self::Uyvy => 2,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::MotionXyz32f => 12,
            Self::SixDof => 28,
        }
    }
}

/// Stream identity: (kind, index)
pub type StreamKey = (StreamKind, u32);

/// User stream request
///
/// Zero in a numeric field and `Format::Any` mean "unconstrained".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StreamRequest {
    /// Stream kind
    pub kind: StreamKind,

    /// Stream index; 0 selects the default index for the kind
    #[serde(default)]
    #[validate(range(max = 16))]
    pub index: u32,

    /// Image width in pixels
    #[serde(default)]
    #[validate(range(max = 16384))]
    pub width: u32,

    /// Image height in pixels
    #[serde(default)]
    #[validate(range(max = 16384))]
    pub height: u32,

    /// Data format
    #[serde(default)]
    pub format: Format,

    /// Frames per second
    #[serde(default)]
    #[validate(range(max = 1000))]
    pub fps: u32,
}

impl StreamRequest {
    /// Fully unconstrained request for `kind`
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            index: 0,
            width: 0,
            height: 0,
            format: Format::Any,
            fps: 0,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Uniqueness key inside a request set
    #[inline]
    pub fn key(&self) -> StreamKey {
        (self.kind, self.index)
    }

    /// Whether `profile` satisfies every pinned field of this request
    pub fn matches(&self, profile: &StreamProfile) -> bool {
        self.kind == profile.kind
            && (self.index == 0 || self.index == profile.index)
            && (self.width == 0 || self.width == profile.width)
            && (self.height == 0 || self.height == profile.height)
            && (self.format == Format::Any || self.format == profile.format)
            && (self.fps == 0 || self.fps == profile.fps)
    }
}

impl fmt::Display for StreamRequest {
    /// Unconstrained fields render as `*`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn field(value: u32) -> String {
            if value == 0 {
                "*".to_string()
            } else {
                value.to_string()
            }
        }
        let format = match self.format {
            Format::Any => "*".to_string(),
            other => format!("{other:?}"),
        };
        write!(
            f,
            "{} #{} {}x{} {} @{}fps",
            self.kind,
            field(self.index),
            field(self.width),
            field(self.height),
            format,
            field(self.fps)
        )
    }
}

/// Concrete stream profile, no wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct StreamProfile {
    pub kind: StreamKind,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub format: Format,
    #[validate(range(min = 1, max = 1000))]
    pub fps: u32,
}

impl StreamProfile {
    pub fn new(
        kind: StreamKind,
        index: u32,
        width: u32,
        height: u32,
        format: Format,
        fps: u32,
    ) -> Self {
        Self {
            kind,
            index,
            width,
            height,
            format,
            fps,
        }
    }

    #[inline]
    pub fn key(&self) -> StreamKey {
        (self.kind, self.index)
    }

    /// Nominal time between frames
    pub fn frame_period_ms(&self) -> f64 {
        1000.0 / f64::from(self.fps.max(1))
    }

    /// Payload size of one frame
    pub fn frame_size(&self) -> usize {
        let pixels = (self.width.max(1) as usize) * (self.height.max(1) as usize);
        pixels * self.format.bytes_per_pixel().max(1)
    }
}

impl fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} {}x{} {:?} @{}fps",
            self.kind, self.index, self.width, self.height, self.format, self.fps
        )
    }
}
