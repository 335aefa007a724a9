//! Object model reconstructed from an After Effects project container.
//!
//! This mirrors the on-disk structure (folders, compositions, layers,
//! property groups) before any conversion to the scene-graph document.

use std::collections::HashMap;

use kurbo::Point;

use crate::animation::FrameTime;
use crate::model::Color;

pub type Id = u32;

/// Label color slot index as stored in item and keyframe records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LabelColor(pub u8);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LayerQuality {
    Wireframe,
    Draft,
    #[default]
    Best,
    Unknown(u16),
}

impl From<u16> for LayerQuality {
    fn from(v: u16) -> Self {
        match v {
            0 => Self::Wireframe,
            1 => Self::Draft,
            2 => Self::Best,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LayerType {
    #[default]
    AssetLayer,
    Light,
    Camera,
    Text,
    Shape,
    Unknown(u8),
}

impl From<u8> for LayerType {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::AssetLayer,
            1 => Self::Light,
            2 => Self::Camera,
            3 => Self::Text,
            4 => Self::Shape,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TrackMatteType {
    #[default]
    None,
    Alpha,
    AlphaInverted,
    Luma,
    LumaInverted,
    Unknown(u8),
}

impl From<u8> for TrackMatteType {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Alpha,
            2 => Self::AlphaInverted,
            3 => Self::Luma,
            4 => Self::LumaInverted,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MaskMode {
    #[default]
    None,
    Add,
    Subtract,
    Intersect,
    Lighten,
    Darken,
    Difference,
    Unknown(u16),
}

impl From<u16> for MaskMode {
    fn from(v: u16) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Add,
            2 => Self::Subtract,
            3 => Self::Intersect,
            4 => Self::Lighten,
            5 => Self::Darken,
            6 => Self::Difference,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyframeTransitionType {
    #[default]
    Linear,
    Bezier,
    Hold,
    Unknown(u8),
}

impl From<u8> for KeyframeTransitionType {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Linear,
            2 => Self::Bezier,
            3 => Self::Hold,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyframeBezierMode {
    #[default]
    Normal,
    Continuous,
    Auto,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LayerSource {
    #[default]
    Layer,
    Masks,
    Effects,
    Unknown(i32),
}

impl From<i32> for LayerSource {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Layer,
            1 => Self::Masks,
            2 => Self::Effects,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerSelection {
    pub layer_id: Id,
    pub layer_source: LayerSource,
}

/// Raw bezier payload from `om-s` shape data: normalized points inside the
/// stored bounds rectangle.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BezierData {
    pub closed: bool,
    pub minimum: Point,
    pub maximum: Point,
    pub points: Vec<Point>,
}

impl BezierData {
    /// Maps a normalized stored point into bounds space.
    pub fn denormalize(&self, p: Point) -> Point {
        Point::new(
            self.minimum.x + p.x * (self.maximum.x - self.minimum.x),
            self.minimum.y + p.y * (self.maximum.y - self.minimum.y),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientStops {
    pub color_stops: Vec<(f64, Color)>,
    pub alpha_stops: Vec<(f64, f64)>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Marker {
    pub name: String,
    pub is_protected: bool,
    pub duration: u32,
    pub label_color: LabelColor,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TextJustify {
    #[default]
    Left,
    Right,
    Center,
    Unknown(i32),
}

impl From<i32> for TextJustify {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::Left,
            1 => Self::Right,
            2 => Self::Center,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineStyle {
    pub character_count: usize,
    pub text_justify: TextJustify,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CharacterStyle {
    pub character_count: usize,
    pub font_index: usize,
    pub size: f64,
    pub faux_bold: bool,
    pub faux_italic: bool,
    pub text_transform: i32,
    pub vertical_align: i32,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_enabled: bool,
    pub stroke_over_fill: bool,
    pub stroke_width: f64,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextDocument {
    pub text: String,
    pub line_styles: Vec<LineStyle>,
    pub character_styles: Vec<CharacterStyle>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Font {
    pub family: String,
}

/// A decoded property payload; which variant applies follows from the
/// property's resolved type.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PropertyValue {
    #[default]
    None,
    Number(f64),
    Vector2(Point),
    Vector3([f64; 3]),
    Color(Color),
    Bezier(BezierData),
    Gradient(GradientStops),
    TextDocument(TextDocument),
    LayerSelection(LayerSelection),
    MaskIndex(u32),
    Marker(Marker),
}

impl PropertyValue {
    /// 1/2/3-component vectors as stored in `cdat` and keyframe records.
    pub fn vector(raw: &[f64]) -> PropertyValue {
        match raw.len() {
            0 => PropertyValue::None,
            1 => PropertyValue::Number(raw[0]),
            2 => PropertyValue::Vector2(Point::new(raw[0], raw[1])),
            _ => PropertyValue::Vector3([raw[0], raw[1], raw[2]]),
        }
    }

    /// ARGB float components scaled to 0..255 in the stream.
    pub fn color(raw: &[f64]) -> PropertyValue {
        if raw.len() < 4 {
            return PropertyValue::Color(Color::TRANSPARENT);
        }
        let c = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        PropertyValue::Color(Color::new(c(raw[1]), c(raw[2]), c(raw[3]), c(raw[0])))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<Point> {
        match self {
            PropertyValue::Number(n) => Some(Point::new(*n, *n)),
            PropertyValue::Vector2(p) => Some(*p),
            PropertyValue::Vector3(v) => Some(Point::new(v[0], v[1])),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            PropertyValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PropertyType {
    #[default]
    MultiDimensional,
    Position,
    Color,
    NoValue,
    Integer,
    LayerSelection,
    MaskIndex,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    pub time: FrameTime,
    pub transition_type: KeyframeTransitionType,
    pub label_color: LabelColor,
    pub roving: bool,
    pub bezier_mode: KeyframeBezierMode,
    pub value: PropertyValue,
    pub in_speed: Vec<f64>,
    pub in_influence: Vec<f64>,
    pub out_speed: Vec<f64>,
    pub out_influence: Vec<f64>,
    /// Spatial tangents, position properties only.
    pub in_tangent: Option<Point>,
    pub out_tangent: Option<Point>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Property {
    pub r#type: PropertyType,
    pub components: u16,
    pub animated: bool,
    pub is_component: bool,
    pub split: bool,
    pub value: PropertyValue,
    pub keyframes: Vec<Keyframe>,
    pub expression: String,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Mask {
    pub inverted: bool,
    pub locked: bool,
    pub mode: MaskMode,
    pub properties: PropertyGroup,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PropertyBase {
    Property(Property),
    Group(PropertyGroup),
    Mask(Mask),
    Text {
        fonts: Vec<Font>,
        documents: Property,
    },
    EffectInstance {
        name: String,
        parameters: PropertyGroup,
    },
}

/// Ordered (match name, payload) pairs, preserving file order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PropertyGroup {
    pub name: String,
    pub visible: bool,
    pub properties: Vec<(String, PropertyBase)>,
}

impl PropertyGroup {
    pub fn property(&self, match_name: &str) -> Option<&PropertyBase> {
        self.properties
            .iter()
            .find(|(mn, _)| mn == match_name)
            .map(|(_, p)| p)
    }

    pub fn simple(&self, match_name: &str) -> Option<&Property> {
        match self.property(match_name) {
            Some(PropertyBase::Property(p)) => Some(p),
            _ => None,
        }
    }

    pub fn group(&self, match_name: &str) -> Option<&PropertyGroup> {
        match self.property(match_name) {
            Some(PropertyBase::Group(g)) => Some(g),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub id: Id,
    pub name: String,
    pub quality: LayerQuality,
    pub time_stretch: f64,
    pub start_time: FrameTime,
    pub in_time: FrameTime,
    pub out_time: FrameTime,
    pub is_guide: bool,
    pub bicubic_sampling: bool,
    pub auto_orient: bool,
    pub is_adjustment: bool,
    pub threedimensional: bool,
    pub solo: bool,
    pub is_null: bool,
    pub visible: bool,
    pub effects_enabled: bool,
    pub motion_blur: bool,
    pub locked: bool,
    pub shy: bool,
    pub continuously_rasterize: bool,
    pub asset_id: Id,
    pub label_color: LabelColor,
    pub matte_mode: TrackMatteType,
    pub matte_id: Id,
    pub parent_id: Id,
    pub r#type: LayerType,
    pub properties: PropertyGroup,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Composition {
    pub id: Id,
    pub name: String,
    pub label_color: LabelColor,
    pub resolution_x: u16,
    pub resolution_y: u16,
    /// Time units per frame; raw chunk times divide by this.
    pub time_scale: f64,
    pub playhead_time: FrameTime,
    pub in_time: FrameTime,
    pub out_time: FrameTime,
    pub duration: FrameTime,
    pub color: Color,
    pub shy: bool,
    pub motion_blur: bool,
    pub frame_blending: bool,
    pub preserve_framerate: bool,
    pub preserve_resolution: bool,
    pub width: u16,
    pub height: u16,
    pub pixel_ratio_width: u32,
    pub pixel_ratio_height: u32,
    pub framerate: f64,
    pub shutter_angle: u16,
    pub shutter_phase: i32,
    pub samples_limit: u32,
    pub samples_per_frame: u32,
    pub layers: Vec<Layer>,
    /// Marker pseudo-layer, only loaded with extras enabled.
    pub markers: Option<Layer>,
    pub views: Vec<Layer>,
}

impl Composition {
    pub fn time_to_frames(&self, time: f64) -> FrameTime {
        if self.time_scale == 0.0 {
            time
        } else {
            time / self.time_scale
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Solid {
    pub name: String,
    pub color: Color,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FileAsset {
    pub name: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ItemData {
    Folder(Folder),
    Composition(Composition),
    Solid {
        width: u16,
        height: u16,
        solid: Solid,
    },
    File {
        width: u16,
        height: u16,
        file: FileAsset,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FolderItem {
    pub id: Id,
    pub name: String,
    pub label_color: LabelColor,
    pub data: ItemData,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Folder {
    pub items: Vec<FolderItem>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EffectParameterType {
    Layer,
    Scalar,
    Angle,
    Boolean,
    Color,
    Vector2D,
    Enum,
    Slider,
    Vector3D,
    #[default]
    Unknown,
}

impl From<u8> for EffectParameterType {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Layer,
            2 => Self::Scalar,
            3 => Self::Angle,
            4 => Self::Boolean,
            5 => Self::Color,
            6 => Self::Vector2D,
            7 => Self::Enum,
            10 => Self::Slider,
            18 => Self::Vector3D,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectParameter {
    pub match_name: String,
    pub name: String,
    pub r#type: EffectParameterType,
    pub last_value: PropertyValue,
    pub default_value: PropertyValue,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectDefinition {
    pub match_name: String,
    pub name: String,
    pub parameters: Vec<EffectParameter>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Project {
    pub folder: Folder,
    /// Ids of the compositions in file order.
    pub composition_ids: Vec<Id>,
    pub effects: HashMap<String, EffectDefinition>,
    pub current_item: Option<Id>,
}

impl Project {
    pub fn composition(&self, id: Id) -> Option<&Composition> {
        fn walk(folder: &Folder, id: Id) -> Option<&Composition> {
            for item in &folder.items {
                match &item.data {
                    ItemData::Composition(c) if item.id == id => return Some(c),
                    ItemData::Folder(f) => {
                        if let Some(c) = walk(f, id) {
                            return Some(c);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        walk(&self.folder, id)
    }

    pub fn item(&self, id: Id) -> Option<&FolderItem> {
        fn walk(folder: &Folder, id: Id) -> Option<&FolderItem> {
            for item in &folder.items {
                if item.id == id {
                    return Some(item);
                }
                if let ItemData::Folder(f) = &item.data
                    && let Some(found) = walk(f, id)
                {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.folder, id)
    }

    pub fn compositions(&self) -> impl Iterator<Item = &Composition> {
        self.composition_ids.iter().filter_map(|id| self.composition(*id))
    }
}
