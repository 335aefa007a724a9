use kurbo::Point;

use crate::binary::BinaryReader;
use crate::error::{VetraError, VetraResult, Warnings};
use crate::model::Color;
use crate::riff::RiffChunk;

use super::project::*;

/// Placeholder the writer stores for unset name strings.
const NAME_PLACEHOLDER: &[u8] = b"-_0_/-";

/// Bit-field accessor over a little group of flag bytes; `byte` counts from
/// the least significant end.
#[derive(Clone, Copy, Debug)]
struct Flags(u32);

impl Flags {
    fn get(self, byte: u32, bit: u32) -> bool {
        (self.0 >> (byte * 8 + bit)) & 1 != 0
    }
}

fn read_u24(r: &mut BinaryReader) -> u32 {
    let b = r.read(3);
    let mut v = 0u32;
    for &byte in b {
        v = v << 8 | u32::from(byte);
    }
    v
}

/// Per-layer time mapping: raw chunk times are in composition time units,
/// shifted by the layer's start offset.
#[derive(Clone, Copy)]
struct PropertyContext {
    time_scale: f64,
    layer_start: f64,
}

impl PropertyContext {
    fn time_to_frames(&self, time: f64) -> f64 {
        if self.time_scale == 0.0 {
            time + self.layer_start
        } else {
            time / self.time_scale + self.layer_start
        }
    }
}

pub struct AepParser<'w> {
    warnings: &'w mut Warnings,
    /// Keeps markers, views, effect instances, orientation and marker
    /// keyframes out of the object model; the downstream document has no
    /// use for them, but the record layouts stay implemented for tooling.
    load_extras: bool,
}

impl<'w> AepParser<'w> {
    pub fn new(warnings: &'w mut Warnings) -> Self {
        Self {
            warnings,
            load_extras: false,
        }
    }

    /// Walks a parsed RIFX tree into a [`Project`]. The `Egg!` form check is
    /// the only fatal error past this point; malformed records degrade to
    /// warnings and defaults.
    #[tracing::instrument(skip(self, root))]
    pub fn parse(&mut self, root: &RiffChunk) -> VetraResult<Project> {
        if &root.subheader != b"Egg!" {
            return Err(VetraError::parse("not an After Effects project"));
        }

        let mut project = Project::default();
        let [fold, efdg] = root.find_multiple([b"Fold", b"EfdG"]);

        if self.load_extras
            && let Some(efdg) = efdg
        {
            self.parse_effect_definitions(efdg, &mut project);
        }

        if let Some(fold) = fold {
            self.parse_folder(fold, &mut project);
        }
        project.composition_ids = collect_composition_ids(&project.folder);
        Ok(project)
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.warn(msg);
    }

    fn to_string(&mut self, chunk: Option<&RiffChunk>) -> String {
        let Some(chunk) = chunk else {
            return String::new();
        };
        if chunk.data == NAME_PLACEHOLDER {
            return String::new();
        }
        if &chunk.id == b"Utf8" {
            return String::from_utf8_lossy(chunk.data).into_owned();
        }
        self.warn(format!("Unknown encoding for {}", chunk.id_str()));
        String::new()
    }

    fn parse_folder(&mut self, chunk: &RiffChunk, project: &mut Project) {
        let items = self.parse_folder_items(chunk, project);
        project.folder.items = items;
    }

    fn parse_folder_items(&mut self, chunk: &RiffChunk, project: &mut Project) -> Vec<FolderItem> {
        let mut items: Vec<FolderItem> = Vec::new();
        for child in &chunk.children {
            if child.name() == b"fiac" {
                if let Some(last) = items.last()
                    && child.reader().read_u8() != 0
                {
                    project.current_item = Some(last.id);
                }
            } else if child.name() == b"Item" {
                let [idta, name_chunk] = child.find_multiple([b"idta", b"Utf8"]);
                let Some(idta) = idta else { continue };
                let name = self.to_string(name_chunk);

                let mut data = idta.reader();
                let item_type = data.read_u16();
                data.skip(14);
                let id = data.read_u32();
                data.skip(38);
                let label_color = LabelColor(data.read_u8());

                match item_type {
                    1 => {
                        let contents = child
                            .child(b"Sfdr")
                            .map(|c| self.parse_folder_items(c, project))
                            .unwrap_or_default();
                        items.push(FolderItem {
                            id,
                            name,
                            label_color,
                            data: ItemData::Folder(Folder { items: contents }),
                        });
                    }
                    4 => {
                        let mut comp = Composition {
                            id,
                            name,
                            label_color,
                            ..Composition::default()
                        };
                        self.parse_composition(child, &mut comp);
                        items.push(FolderItem {
                            id,
                            name: comp.name.clone(),
                            label_color,
                            data: ItemData::Composition(comp),
                        });
                    }
                    7 => {
                        if let Some(pin) = child.child(b"Pin ")
                            && let Some(item) = self.parse_asset(id, name, label_color, pin)
                        {
                            items.push(item);
                        }
                    }
                    other => self.warn(format!("Unknown Item type {other}")),
                }
            }
        }
        items
    }

    fn parse_composition(&mut self, chunk: &RiffChunk, comp: &mut Composition) {
        let Some(cdta) = chunk.child(b"cdta") else {
            self.warn("Missing composition data");
            return;
        };

        let mut data = cdta.reader();
        comp.resolution_x = data.read_u16();
        comp.resolution_y = data.read_u16();
        data.skip(1);
        comp.time_scale = f64::from(data.read_u16());
        data.skip(14);
        comp.playhead_time = comp.time_to_frames(f64::from(data.read_u16()));
        data.skip(6);
        comp.in_time = comp.time_to_frames(f64::from(data.read_u16()));
        data.skip(6);
        let out_time = data.read_u16();
        data.skip(6);
        comp.duration = comp.time_to_frames(f64::from(data.read_u16()));
        // 0xffff means "runs to the end".
        comp.out_time = if out_time == 0xffff {
            comp.duration
        } else {
            comp.time_to_frames(f64::from(out_time))
        };
        data.skip(5);

        comp.color = Color::rgb(data.read_u8(), data.read_u8(), data.read_u8());

        data.skip(84);
        let attr = Flags(u32::from(data.read_u8()));
        comp.shy = attr.get(0, 0);
        comp.motion_blur = attr.get(0, 3);
        comp.frame_blending = attr.get(0, 4);
        comp.preserve_framerate = attr.get(0, 5);
        comp.preserve_resolution = attr.get(0, 7);

        comp.width = data.read_u16();
        comp.height = data.read_u16();
        comp.pixel_ratio_width = data.read_u32();
        comp.pixel_ratio_height = data.read_u32();
        data.skip(4);
        comp.framerate = f64::from(data.read_u16());

        data.skip(16);
        comp.shutter_angle = data.read_u16();
        comp.shutter_phase = data.read_i32();
        data.skip(16);
        comp.samples_limit = data.read_u32();
        comp.samples_per_frame = data.read_u32();

        for child in &chunk.children {
            match child.name() {
                b"Layr" => {
                    if let Some(layer) = self.parse_layer(child, comp) {
                        comp.layers.push(layer);
                    }
                }
                b"SecL" if self.load_extras => {
                    comp.markers = self.parse_layer(child, comp);
                }
                b"CLay" | b"DLay" | b"SLay" if self.load_extras => {
                    if let Some(layer) = self.parse_layer(child, comp) {
                        comp.views.push(layer);
                    }
                }
                _ => {}
            }
        }
    }

    fn parse_asset(
        &mut self,
        id: Id,
        name: String,
        label_color: LabelColor,
        chunk: &RiffChunk,
    ) -> Option<FolderItem> {
        let [sspc, utf8, als2, opti] = chunk.find_multiple([b"sspc", b"Utf8", b"Als2", b"opti"]);
        let (Some(sspc), Some(opti)) = (sspc, opti) else {
            self.warn("Missing asset data");
            return None;
        };
        let name = if name.is_empty() {
            self.to_string(utf8)
        } else {
            name
        };

        let mut asset_reader = sspc.reader();
        asset_reader.skip(32);
        let width = asset_reader.read_u16();
        asset_reader.skip(2);
        let height = asset_reader.read_u16();

        let mut data = opti.reader();
        let data_kind = data.read(4);
        if data_kind == b"Soli" {
            data.skip(6);
            let to_u8 = |v: f32| (f64::from(v) * 255.0).round().clamp(0.0, 255.0) as u8;
            let a = to_u8(data.read_f32());
            let r = to_u8(data.read_f32());
            let g = to_u8(data.read_f32());
            let b = to_u8(data.read_f32());
            let solid_name = data.read_utf8_nul(256);
            Some(FolderItem {
                id,
                name,
                label_color,
                data: ItemData::Solid {
                    width,
                    height,
                    solid: Solid {
                        name: solid_name,
                        color: Color::new(r, g, b, a),
                    },
                },
            })
        } else {
            let path = als2
                .and_then(|c| c.child(b"alas"))
                .and_then(|c| serde_json::from_slice::<serde_json::Value>(c.data).ok())
                .and_then(|v| v.get("fullpath").and_then(|p| p.as_str().map(String::from)))
                .unwrap_or_default();
            let path = normalize_path(path);
            let file_name = path.rsplit('/').next().unwrap_or_default().to_string();
            Some(FolderItem {
                id,
                name: if name.is_empty() {
                    file_name.clone()
                } else {
                    name
                },
                label_color,
                data: ItemData::File {
                    width,
                    height,
                    file: FileAsset {
                        name: file_name,
                        path,
                    },
                },
            })
        }
    }

    fn parse_layer(&mut self, chunk: &RiffChunk, comp: &Composition) -> Option<Layer> {
        let [ldta, utf8, tdgp] = chunk.find_multiple([b"ldta", b"Utf8", b"tdgp"]);
        let Some(ldta) = ldta else {
            self.warn("Missing layer data");
            return None;
        };

        let mut layer = Layer {
            name: self.to_string(utf8),
            ..Layer::default()
        };

        let mut data = ldta.reader();
        layer.id = data.read_u32();
        layer.quality = LayerQuality::from(data.read_u16());
        data.skip(4);
        let stretch_numerator = f64::from(data.read_u16());
        data.skip(1);
        layer.start_time = comp.time_to_frames(f64::from(data.read_i16()));
        data.skip(6);
        let context = PropertyContext {
            time_scale: comp.time_scale,
            layer_start: layer.start_time,
        };
        layer.in_time = context.time_to_frames(f64::from(data.read_u16()));
        data.skip(6);
        layer.out_time = context.time_to_frames(f64::from(data.read_u16()));
        data.skip(6);
        let flags = Flags(read_u24(&mut data));
        layer.is_guide = flags.get(2, 1);
        layer.bicubic_sampling = flags.get(2, 6);
        layer.auto_orient = flags.get(1, 0);
        layer.is_adjustment = flags.get(1, 1);
        layer.threedimensional = flags.get(1, 2);
        layer.solo = flags.get(1, 3);
        layer.is_null = flags.get(1, 7);
        layer.visible = flags.get(0, 0);
        layer.effects_enabled = flags.get(0, 2);
        layer.motion_blur = flags.get(0, 3);
        layer.locked = flags.get(0, 5);
        layer.shy = flags.get(0, 6);
        layer.continuously_rasterize = flags.get(0, 7);
        layer.asset_id = data.read_u32();
        data.skip(17);
        layer.label_color = LabelColor(data.read_u8());
        data.skip(2);
        // 32-byte inline name, superseded by the Utf8 chunk.
        data.skip(32);
        data.skip(11);
        layer.matte_mode = TrackMatteType::from(data.read_u8());
        data.skip(2);
        let stretch_denominator = f64::from(data.read_u16());
        layer.time_stretch = if stretch_denominator == 0.0 {
            1.0
        } else {
            stretch_numerator / stretch_denominator
        };
        data.skip(19);
        layer.r#type = LayerType::from(data.read_u8());
        layer.parent_id = data.read_u32();
        data.skip(24);
        layer.matte_id = data.read_u32();

        if let Some(tdgp) = tdgp {
            self.parse_property_group_into(tdgp, &mut layer.properties, context);
        }
        Some(layer)
    }

    fn parse_property_group_into(
        &mut self,
        chunk: &RiffChunk,
        group: &mut PropertyGroup,
        context: PropertyContext,
    ) {
        let mut match_name = String::new();
        let mut i = 0;
        while i < chunk.children.len() {
            let child = &chunk.children[i];
            i += 1;

            match child.name() {
                b"tdmn" => {
                    match_name = child.reader().read_utf8_nul(child.data.len());
                }
                b"tdsb" => {
                    let flags = Flags(child.reader().read_u32());
                    group.visible = flags.get(0, 0);
                }
                b"tdsn" => {
                    group.name = self.to_string(child.child(b"Utf8"));
                }
                b"mkif" => {
                    let mut mask = Mask::default();
                    let mut data = child.reader();
                    mask.inverted = data.read_u8() != 0;
                    mask.locked = data.read_u8() != 0;
                    data.skip(4);
                    mask.mode = MaskMode::from(data.read_u16());

                    let Some(next) = chunk.children.get(i) else {
                        self.warn("Missing mask properties");
                        return;
                    };
                    if next.name() != b"tdgp" {
                        self.warn("Missing mask properties");
                        continue;
                    }
                    i += 1;
                    self.parse_property_group_into(next, &mut mask.properties, context);
                    group
                        .properties
                        .push((std::mem::take(&mut match_name), PropertyBase::Mask(mask)));
                }
                _ if !match_name.is_empty() => {
                    if let Some(prop) = self.parse_property(child, context) {
                        group
                            .properties
                            .push((std::mem::take(&mut match_name), prop));
                    } else {
                        match_name.clear();
                    }
                }
                _ => {}
            }
        }
    }

    fn parse_property(&mut self, chunk: &RiffChunk, context: PropertyContext) -> Option<PropertyBase> {
        match chunk.name() {
            b"tdgp" => {
                let mut group = PropertyGroup::default();
                self.parse_property_group_into(chunk, &mut group, context);
                Some(PropertyBase::Group(group))
            }
            b"tdbs" => self
                .parse_animated_property(Some(chunk), context, Vec::new())
                .map(PropertyBase::Property),
            b"om-s" => self
                .parse_animated_with_values(chunk, context, b"omks", b"shap", Self::parse_bezier)
                .map(PropertyBase::Property),
            b"GCst" => self
                .parse_animated_with_values(chunk, context, b"GCky", b"Utf8", Self::parse_gradient)
                .map(PropertyBase::Property),
            b"btds" => self.parse_animated_text(chunk, context),
            b"sspc" => self.parse_effect_instance(chunk, context),
            b"otst" if self.load_extras => self
                .parse_animated_with_values(chunk, context, b"otky", b"otda", Self::parse_orientation)
                .map(PropertyBase::Property),
            b"mrst" if self.load_extras => self
                .parse_animated_with_values(chunk, context, b"mrky", b"Nmrd", Self::parse_marker)
                .map(PropertyBase::Property),
            b"otst" | b"mrst" | b"OvG2" | b"blsi" | b"blsv" => None,
            other => {
                self.warn(format!(
                    "Unknown property type: {}",
                    String::from_utf8_lossy(other)
                ));
                None
            }
        }
    }

    fn parse_animated_with_values(
        &mut self,
        chunk: &RiffChunk,
        context: PropertyContext,
        container: &[u8; 4],
        value_name: &[u8; 4],
        parse: fn(&mut Self, &RiffChunk) -> Option<PropertyValue>,
    ) -> Option<Property> {
        let [value_container, tdbs] = chunk.find_multiple([container, b"tdbs"]);
        let mut values = Vec::new();
        if let Some(vc) = value_container {
            for value_chunk in vc.find_all(value_name) {
                values.push(parse(self, value_chunk).unwrap_or_default());
            }
        }
        self.parse_animated_property(tdbs, context, values)
    }

    fn parse_animated_property(
        &mut self,
        chunk: Option<&RiffChunk>,
        context: PropertyContext,
        mut values: Vec<PropertyValue>,
    ) -> Option<Property> {
        let chunk = chunk?;
        let [tdsb, header, value, keyframes, expression, tdpi, tdps, tdli] = chunk.find_multiple([
            b"tdsb", b"tdb4", b"cdat", b"list", b"Utf8", b"tdpi", b"tdps", b"tdli",
        ]);

        let Some(header) = header else {
            self.warn("Missing property header");
            return None;
        };

        let mut prop = Property::default();

        if let Some(tdsb) = tdsb {
            let flags = Flags(tdsb.reader().read_u32());
            prop.split = flags.get(1, 3);
        }

        let mut data = header.reader();
        data.skip(2);
        prop.components = data.read_u16();

        let position = Flags(u32::from(data.read_u16())).get(0, 3);
        data.skip(10 + 8 * 5);
        let type_flags = Flags(data.read_u32());
        let no_value = type_flags.get(2, 0);
        let color = type_flags.get(0, 0);
        let integer = type_flags.get(0, 2);
        data.skip(8);

        prop.r#type = if position {
            PropertyType::Position
        } else if color {
            PropertyType::Color
        } else if no_value {
            PropertyType::NoValue
        } else if integer {
            PropertyType::Integer
        } else {
            PropertyType::MultiDimensional
        };

        prop.animated = data.read_u8() == 1;
        data.skip(6);
        prop.is_component = data.read_u8() == 1;

        if integer && tdpi.is_some() {
            prop.r#type = PropertyType::LayerSelection;
            let mut val = LayerSelection {
                layer_id: tdpi.map(|c| c.reader().read_u32()).unwrap_or_default(),
                layer_source: LayerSource::default(),
            };
            if let Some(tdps) = tdps {
                val.layer_source = LayerSource::from(tdps.reader().read_i32());
            }
            prop.value = PropertyValue::LayerSelection(val);
        } else if integer && tdli.is_some() {
            prop.r#type = PropertyType::MaskIndex;
            prop.value = PropertyValue::MaskIndex(tdli.map(|c| c.reader().read_u32()).unwrap_or_default());
        } else if let Some(keyframes) = keyframes {
            let raw_keys = self.list_values(keyframes);
            for (i, mut reader) in raw_keys.into_iter().enumerate() {
                let kf = self.load_keyframe(i, &mut reader, &prop, context, &mut values);
                prop.keyframes.push(kf);
            }
        } else if let Some(value) = value {
            let mut vdat = value.reader();
            let raw_value = vdat.read_f64_array(usize::from(prop.components));
            prop.value = property_value(0, &raw_value, &mut values, prop.r#type);
        }

        prop.expression = self.to_string(expression);
        Some(prop)
    }

    /// Splits a `list` chunk into per-record cursors. The header declares
    /// record count and stride; a shorter payload is rejected here rather
    /// than trusted downstream.
    fn list_values<'a>(&mut self, list: &RiffChunk<'a>) -> Vec<BinaryReader<'a>> {
        let [head, vals] = list.find_multiple([b"lhd3", b"ldat"]);
        let (Some(head), Some(vals)) = (head, vals) else {
            self.warn("Missing list data");
            return Vec::new();
        };

        let mut data = head.reader();
        data.skip(10);
        let count = usize::from(data.read_u16());
        data.skip(6);
        let size = usize::from(data.read_u16());
        if vals.data.len() < count * size {
            self.warn("Not enough data in list");
            return Vec::new();
        }

        let reader = vals.reader();
        (0..count).map(|i| reader.sub_reader(i * size, size)).collect()
    }

    fn load_keyframe(
        &mut self,
        index: usize,
        reader: &mut BinaryReader,
        prop: &Property,
        context: PropertyContext,
        values: &mut [PropertyValue],
    ) -> Keyframe {
        let mut kf = Keyframe::default();

        reader.skip(1);
        kf.time = context.time_to_frames(f64::from(reader.read_u16()));
        reader.skip(2);

        kf.transition_type = KeyframeTransitionType::from(reader.read_u8());
        kf.label_color = LabelColor(reader.read_u8());

        let flags = Flags(u32::from(reader.read_u8()));
        kf.roving = flags.get(0, 5);
        kf.bezier_mode = if flags.get(0, 3) {
            KeyframeBezierMode::Continuous
        } else if flags.get(0, 4) {
            KeyframeBezierMode::Auto
        } else {
            KeyframeBezierMode::Normal
        };

        let components = usize::from(prop.components);
        match prop.r#type {
            PropertyType::NoValue => {
                reader.skip(16);
                kf.in_speed.push(reader.read_f64());
                kf.in_influence.push(reader.read_f64());
                kf.out_speed.push(reader.read_f64());
                kf.out_influence.push(reader.read_f64());
                if let Some(v) = values.get_mut(index) {
                    kf.value = std::mem::take(v);
                } else {
                    self.warn("Missing keyframe value");
                }
            }
            PropertyType::MultiDimensional | PropertyType::Integer => {
                kf.value = PropertyValue::vector(&reader.read_f64_array(components));
                kf.in_speed = reader.read_f64_array(components);
                kf.in_influence = reader.read_f64_array(components);
                kf.out_speed = reader.read_f64_array(components);
                kf.out_influence = reader.read_f64_array(components);
            }
            PropertyType::Position => {
                reader.skip(16);
                kf.in_speed.push(reader.read_f64());
                kf.in_influence.push(reader.read_f64());
                kf.out_speed.push(reader.read_f64());
                kf.out_influence.push(reader.read_f64());
                kf.value = PropertyValue::vector(&reader.read_f64_array(components));
                let in_tangent = reader.read_f64_array(components);
                let out_tangent = reader.read_f64_array(components);
                if components >= 2 {
                    kf.in_tangent = Some(Point::new(in_tangent[0], in_tangent[1]));
                    kf.out_tangent = Some(Point::new(out_tangent[0], out_tangent[1]));
                }
            }
            PropertyType::Color => {
                reader.skip(16);
                kf.in_speed.push(reader.read_f64());
                kf.in_influence.push(reader.read_f64());
                kf.out_speed.push(reader.read_f64());
                kf.out_influence.push(reader.read_f64());
                kf.value = PropertyValue::color(&reader.read_f64_array(components));
            }
            PropertyType::LayerSelection | PropertyType::MaskIndex => {}
        }

        kf
    }

    fn parse_bezier(&mut self, chunk: &RiffChunk) -> Option<PropertyValue> {
        let Some(shph) = chunk.child(b"shph") else {
            self.warn("Missing bezier bounds");
            return None;
        };
        let mut data = BezierData::default();
        let mut bounds = shph.reader();
        bounds.skip(3);
        data.closed = !Flags(u32::from(bounds.read_u8())).get(0, 3);
        data.minimum = Point::new(f64::from(bounds.read_f32()), f64::from(bounds.read_f32()));
        data.maximum = Point::new(f64::from(bounds.read_f32()), f64::from(bounds.read_f32()));

        if let Some(list) = chunk.child(b"list") {
            for mut pt in self.list_values(list) {
                let x = f64::from(pt.read_f32());
                let y = f64::from(pt.read_f32());
                data.points.push(Point::new(x, y));
            }
        }

        Some(PropertyValue::Bezier(data))
    }

    fn parse_gradient(&mut self, chunk: &RiffChunk) -> Option<PropertyValue> {
        let text = self.to_string(Some(chunk));
        match parse_gradient_xml(&text) {
            Ok(stops) => Some(PropertyValue::Gradient(stops)),
            Err(err) => {
                self.warn(format!("Invalid gradient: {err}"));
                None
            }
        }
    }

    fn parse_orientation(&mut self, chunk: &RiffChunk) -> Option<PropertyValue> {
        let mut data = chunk.reader();
        Some(PropertyValue::Vector3([
            data.read_f64(),
            data.read_f64(),
            data.read_f64(),
        ]))
    }

    fn parse_marker(&mut self, chunk: &RiffChunk) -> Option<PropertyValue> {
        let name = self.to_string(chunk.child(b"Utf8"));
        let Some(nmhd) = chunk.child(b"NmHd") else {
            self.warn("Missing marker data");
            return None;
        };
        let mut data = nmhd.reader();
        data.skip(4);
        let is_protected = data.read_u8() & 2 != 0;
        data.skip(4);
        let duration = data.read_u32();
        data.skip(4);
        let label_color = LabelColor(data.read_u8());
        Some(PropertyValue::Marker(Marker {
            name,
            is_protected,
            duration,
            label_color,
        }))
    }

    fn parse_animated_text(
        &mut self,
        chunk: &RiffChunk,
        context: PropertyContext,
    ) -> Option<PropertyBase> {
        let [text_data, tdbs] = chunk.find_multiple([b"btdk", b"tdbs"]);
        let text_data = text_data?;

        let cos = match super::cos::CosParser::new(text_data.data).parse() {
            Ok(v @ super::cos::CosValue::Object(_)) => v,
            Ok(_) => {
                self.warn("Invalid text document: expected object");
                return None;
            }
            Err(err) => {
                self.warn(format!("Invalid text document: {err}"));
                return None;
            }
        };

        let mut fonts = Vec::new();
        for font in cos.array_at(&[0, 1, 0]).unwrap_or_default() {
            fonts.push(Font {
                family: font.string_at(&[0, 0, 0]).unwrap_or_default().to_string(),
            });
        }

        let mut values = Vec::new();
        for doc in cos.array_at(&[1, 1]).unwrap_or_default() {
            match parse_text_document(doc) {
                Ok(doc) => values.push(PropertyValue::TextDocument(doc)),
                Err(err) => {
                    self.warn(format!("Invalid text document: {err}"));
                    return None;
                }
            }
        }

        let documents = self.parse_animated_property(tdbs, context, values)?;
        Some(PropertyBase::Text { fonts, documents })
    }

    fn parse_effect_instance(
        &mut self,
        chunk: &RiffChunk,
        context: PropertyContext,
    ) -> Option<PropertyBase> {
        if !self.load_extras {
            return None;
        }
        let [fnam, tdgp] = chunk.find_multiple([b"fnam", b"tdgp"]);
        let name = fnam
            .map(|f| self.to_string(f.child(b"Utf8")))
            .unwrap_or_default();
        let mut parameters = PropertyGroup::default();
        if let Some(tdgp) = tdgp {
            self.parse_property_group_into(tdgp, &mut parameters, context);
        }
        Some(PropertyBase::EffectInstance { name, parameters })
    }

    fn parse_effect_definitions(&mut self, efdg: &RiffChunk, project: &mut Project) {
        for chunk in efdg.find_all(b"EfDf") {
            let [tdmn, sspc] = chunk.find_multiple([b"tdmn", b"sspc"]);
            let (Some(tdmn), Some(sspc)) = (tdmn, sspc) else {
                continue;
            };

            let match_name = tdmn.reader().read_utf8_nul(tdmn.data.len());
            let mut effect = EffectDefinition {
                match_name: match_name.clone(),
                ..EffectDefinition::default()
            };

            if let Some(fnam) = sspc.child(b"fnam") {
                effect.name = self.to_string(fnam.child(b"Utf8"));
            }

            if let Some(part) = sspc.child(b"parT") {
                let mut param_mn = String::new();
                for param_chunk in &part.children {
                    if &param_chunk.id == b"tdmn" {
                        param_mn = param_chunk.reader().read_utf8_nul(param_chunk.data.len());
                    } else {
                        let mut param = EffectParameter {
                            match_name: param_mn.clone(),
                            ..EffectParameter::default()
                        };
                        parse_effect_parameter(&mut param, param_chunk.reader());
                        effect.parameters.push(param);
                    }
                }
            }

            project.effects.insert(match_name, effect);
        }
    }
}

fn property_value(
    index: usize,
    raw_value: &[f64],
    values: &mut [PropertyValue],
    prop_type: PropertyType,
) -> PropertyValue {
    match prop_type {
        PropertyType::NoValue => values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default(),
        PropertyType::Color => PropertyValue::color(raw_value),
        _ => PropertyValue::vector(raw_value),
    }
}

fn parse_effect_parameter(param: &mut EffectParameter, mut data: BinaryReader) {
    data.skip(15);
    param.r#type = EffectParameterType::from(data.read_u8());
    param.name = data.read_utf8_nul(32);
    data.skip(8);

    match param.r#type {
        EffectParameterType::Layer => {
            param.last_value = PropertyValue::LayerSelection(LayerSelection::default());
            param.default_value = PropertyValue::LayerSelection(LayerSelection::default());
        }
        EffectParameterType::Scalar | EffectParameterType::Angle => {
            param.last_value = PropertyValue::Number(f64::from(data.read_i32()) / f64::from(0x10000));
            param.default_value = PropertyValue::Number(0.0);
        }
        EffectParameterType::Boolean => {
            param.last_value = PropertyValue::Number(f64::from(data.read_u32()));
            param.default_value = PropertyValue::Number(f64::from(data.read_u8()));
        }
        EffectParameterType::Color => {
            let a = data.read_u8();
            let r = data.read_u8();
            let g = data.read_u8();
            let b = data.read_u8();
            param.last_value = PropertyValue::Color(Color::new(r, g, b, a));
            data.skip(1);
            let r = data.read_u8();
            let g = data.read_u8();
            let b = data.read_u8();
            param.default_value = PropertyValue::Color(Color::rgb(r, g, b));
        }
        EffectParameterType::Vector2D => {
            let x = f64::from(data.read_i32());
            let y = f64::from(data.read_i32());
            param.last_value = PropertyValue::Vector2(Point::new(x / 128.0, y / 128.0));
            param.default_value = PropertyValue::Vector2(Point::ZERO);
        }
        EffectParameterType::Enum => {
            param.last_value = PropertyValue::Number(f64::from(data.read_u32()));
            // Number of enum values.
            data.skip(2);
            param.default_value = PropertyValue::Number(f64::from(data.read_u16()));
        }
        EffectParameterType::Slider => {
            param.last_value = PropertyValue::Number(data.read_f64());
            param.default_value = PropertyValue::Number(0.0);
        }
        EffectParameterType::Vector3D => {
            let x = data.read_f64() * 512.0;
            let y = data.read_f64() * 512.0;
            let z = data.read_f64() * 512.0;
            param.last_value = PropertyValue::Vector3([x, y, z]);
            param.default_value = PropertyValue::Vector3([0.0, 0.0, 0.0]);
        }
        EffectParameterType::Unknown => {
            param.last_value = PropertyValue::Number(0.0);
            param.default_value = PropertyValue::Number(0.0);
        }
    }
}

fn parse_text_document(cos: &super::cos::CosValue) -> VetraResult<TextDocument> {
    let mut doc = TextDocument {
        text: cos
            .string_at(&[0, 0])
            .ok_or_else(|| VetraError::parse("text document missing text"))?
            .to_string(),
        ..TextDocument::default()
    };

    for cs in cos.array_at(&[0, 5, 0]).unwrap_or_default() {
        let data = cs
            .get_path(&[0, 0, 5])
            .ok_or_else(|| VetraError::parse("missing line style data"))?;
        doc.line_styles.push(LineStyle {
            character_count: cs.number_at(&[1]).unwrap_or_default() as usize,
            text_justify: TextJustify::from(data.number_at(&[0]).unwrap_or_default() as i32),
        });
    }

    for cs in cos.array_at(&[0, 6, 0]).unwrap_or_default() {
        let data = cs
            .get_path(&[0, 0, 6])
            .ok_or_else(|| VetraError::parse("missing character style data"))?;
        doc.character_styles.push(CharacterStyle {
            character_count: cs.number_at(&[1]).unwrap_or_default() as usize,
            font_index: data.number_at(&[0]).unwrap_or_default() as usize,
            size: data.number_at(&[1]).unwrap_or_default(),
            faux_bold: data.bool_at(&[2]).unwrap_or_default(),
            faux_italic: data.bool_at(&[3]).unwrap_or_default(),
            text_transform: data.number_at(&[12]).unwrap_or_default() as i32,
            vertical_align: data.number_at(&[13]).unwrap_or_default() as i32,
            fill_color: cos_color(data.get_path(&[53, 0, 1]))?,
            stroke_color: cos_color(data.get_path(&[54, 0, 1]))?,
            stroke_enabled: data.bool_at(&[57]).unwrap_or_default(),
            stroke_over_fill: data.bool_at(&[58]).unwrap_or_default(),
            stroke_width: data.number_at(&[63]).unwrap_or_default(),
        });
    }

    Ok(doc)
}

/// ARGB float array in `[0, 1]` per channel.
fn cos_color(cos: Option<&super::cos::CosValue>) -> VetraResult<Color> {
    let arr = cos
        .and_then(|c| c.array_at(&[]))
        .ok_or_else(|| VetraError::parse("missing color array"))?;
    if arr.len() < 4 {
        return Err(VetraError::parse("not enough components for color"));
    }
    let chan = |v: &super::cos::CosValue| match v {
        super::cos::CosValue::Number(n) => (n * 255.0).round().clamp(0.0, 255.0) as u8,
        _ => 0,
    };
    Ok(Color::new(
        chan(&arr[1]),
        chan(&arr[2]),
        chan(&arr[3]),
        chan(&arr[0]),
    ))
}

/// Windows-style paths in asset records become slash paths; drive letters
/// are absorbed under a leading slash.
fn normalize_path(path: String) -> String {
    if !path.contains('\\') {
        return path;
    }
    let path = path.replace('\\', "/");
    if path.len() > 1 && path.as_bytes()[1] == b':' {
        format!("/{path}")
    } else {
        path
    }
}

/// Gradient payloads are little XML documents keyed by `prop.pair` entries;
/// stops live in `Stops Color` ([offset, midpoint, r, g, b]) and
/// `Stops Alpha` ([offset, midpoint, alpha]) float arrays.
pub fn parse_gradient_xml(text: &str) -> VetraResult<GradientStops> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| VetraError::parse(format!("gradient xml: {e}")))?;

    let mut stops = GradientStops::default();
    for pair in doc.descendants().filter(|n| n.has_tag_name("prop.pair")) {
        let Some(key) = pair
            .children()
            .find(|c| c.has_tag_name("key"))
            .and_then(|k| k.text())
        else {
            continue;
        };
        if key != "Stops Color" && key != "Stops Alpha" {
            continue;
        }
        let floats: Vec<f64> = pair
            .descendants()
            .filter(|n| n.has_tag_name("float"))
            .filter_map(|n| n.text())
            .filter_map(|t| t.trim().parse().ok())
            .collect();
        if key == "Stops Color" && floats.len() >= 5 {
            let chan = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
            stops.color_stops.push((
                floats[0],
                Color::rgb(chan(floats[2]), chan(floats[3]), chan(floats[4])),
            ));
        } else if key == "Stops Alpha" && floats.len() >= 3 {
            stops.alpha_stops.push((floats[0], floats[2]));
        }
    }

    stops
        .color_stops
        .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    stops
        .alpha_stops
        .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    Ok(stops)
}

fn collect_composition_ids(folder: &Folder) -> Vec<Id> {
    let mut out = Vec::new();
    for item in &folder.items {
        match &item.data {
            ItemData::Composition(_) => out.push(item.id),
            ItemData::Folder(f) => out.extend(collect_composition_ids(f)),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_index_bytes_from_low_end() {
        let f = Flags(0x0001_0204);
        assert!(f.get(0, 2));
        assert!(f.get(1, 1));
        assert!(f.get(2, 0));
        assert!(!f.get(0, 0));
    }

    #[test]
    fn normalizes_windows_paths() {
        assert_eq!(
            normalize_path(r"C:\images\bg.png".to_string()),
            "/C:/images/bg.png"
        );
        assert_eq!(
            normalize_path(r"\\share\bg.png".to_string()),
            "//share/bg.png"
        );
        assert_eq!(normalize_path("/a/b.png".to_string()), "/a/b.png");
    }

    #[test]
    fn gradient_xml_collects_sorted_stops() {
        let xml = r#"<prop.map><prop.list>
            <prop.pair><key>Stop-1</key><prop.list>
                <prop.pair><key>Stops Color</key>
                    <array><float>1</float><float>0.5</float><float>0</float><float>0</float><float>1</float></array>
                </prop.pair>
            </prop.list></prop.pair>
            <prop.pair><key>Stop-0</key><prop.list>
                <prop.pair><key>Stops Color</key>
                    <array><float>0</float><float>0.5</float><float>1</float><float>0</float><float>0</float></array>
                </prop.pair>
                <prop.pair><key>Stops Alpha</key>
                    <array><float>0</float><float>0.5</float><float>0.25</float></array>
                </prop.pair>
            </prop.list></prop.pair>
        </prop.list></prop.map>"#;
        let stops = parse_gradient_xml(xml).unwrap();
        assert_eq!(stops.color_stops.len(), 2);
        assert_eq!(stops.color_stops[0], (0.0, Color::rgb(255, 0, 0)));
        assert_eq!(stops.color_stops[1], (1.0, Color::rgb(0, 0, 255)));
        assert_eq!(stops.alpha_stops, vec![(0.0, 0.25)]);
    }
}
