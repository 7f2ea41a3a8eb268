// ============================================================
// Layer 6 — Parameter Manifest
// ============================================================
// A flat view of a parameter set: dotted field path → shape.
//
//   model      → serialise its record with the named MessagePack
//                recorder and walk the result
//   .mpk.gz    → gunzip and walk the same structure
//   .pth / .pt → list the pickled tensors, then rename them the
//                way the PyTorch import does (key remap,
//                LayerNorm weight/bias → gamma/beta, Linear
//                weights transposed)
//
// Two manifests are compared key for key before any record is
// loaded, because the record loaders drop names they don't know
// and only see the fields the model declares.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use flate2::read::GzDecoder;
use regex::Regex;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

/// Field path → tensor shape, ordered by path.
pub type ParamManifest = BTreeMap<String, Vec<usize>>;

/// Parameters declared by a module.
pub fn of_module<B: Backend, M: Module<B>>(module: &M) -> Result<ParamManifest, String> {
    let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
    let bytes = Recorder::<B>::record(&recorder, module.clone().into_record(), ())
        .map_err(|e| format!("cannot serialise parameters: {e:?}"))?;
    from_named_mpk(bytes.as_slice())
}

/// Parameters stored in a named MessagePack + gzip record.
pub fn of_compact_file(path: &Path) -> Result<ParamManifest, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    from_named_mpk(GzDecoder::new(BufReader::new(file)))
}

/// Parameters stored in a PyTorch state dict, renamed to the field
/// paths `expected` uses.
pub fn of_pytorch_file(
    path:     &Path,
    remap:    &[(Regex, &str)],
    expected: &ParamManifest,
) -> Result<ParamManifest, String> {
    let tensors = candle_core::pickle::read_pth_tensor_info(path, false, None)
        .map_err(|e| e.to_string())?;
    Ok(adapt_pytorch(
        tensors.into_iter().map(|t| (t.name, t.layout.shape().dims().to_vec())),
        remap,
        expected,
    ))
}

pub(crate) fn adapt_pytorch(
    entries:  impl IntoIterator<Item = (String, Vec<usize>)>,
    remap:    &[(Regex, &str)],
    expected: &ParamManifest,
) -> ParamManifest {
    entries
        .into_iter()
        .map(|(name, mut shape)| {
            let mut key = name;
            for (pattern, replacement) in remap {
                key = pattern.replace_all(&key, *replacement).into_owned();
            }

            let norm_name = key.rsplit_once('.').and_then(|(module, leaf)| match leaf {
                "weight" => Some(format!("{module}.gamma")),
                "bias"   => Some(format!("{module}.beta")),
                _        => None,
            });
            if let Some(norm_name) = norm_name {
                if !expected.contains_key(&key) && expected.contains_key(&norm_name) {
                    key = norm_name;
                }
            }

            // PyTorch Linear stores [out, in].
            if key.ends_with(".weight") && shape.len() == 2 {
                shape.reverse();
            }
            (key, shape)
        })
        .collect()
}

/// Every difference between the parameters a model needs and the
/// ones a file supplies. Empty when they match exactly.
pub fn diff(expected: &ParamManifest, supplied: &ParamManifest) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, shape) in expected {
        match supplied.get(name) {
            None => problems.push(format!("missing parameter '{name}'")),
            Some(found) if found != shape => problems.push(format!(
                "'{name}' has shape {found:?}, expected {shape:?}"
            )),
            Some(_) => {}
        }
    }
    for name in supplied.keys().filter(|k| !expected.contains_key(*k)) {
        problems.push(format!("unexpected parameter '{name}'"));
    }
    problems
}

fn from_named_mpk<R: Read>(reader: R) -> Result<ParamManifest, String> {
    let root: RecordNode = rmp_serde::from_read(reader).map_err(|e| e.to_string())?;

    // Recorders wrap the record as { metadata, item }.
    let item = match &root {
        RecordNode::Map(entries) => field(entries, "item").unwrap_or(&root),
        _ => &root,
    };

    let mut out = ParamManifest::new();
    collect(item, &mut Vec::new(), &mut out);
    Ok(out)
}

/// Schema-free view of a deserialised record.
#[derive(Debug)]
enum RecordNode {
    Map(Vec<(String, RecordNode)>),
    Seq(Vec<RecordNode>),
    Int(u64),
    Other,
}

fn field<'a>(entries: &'a [(String, RecordNode)], name: &str) -> Option<&'a RecordNode> {
    entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

fn collect(node: &RecordNode, path: &mut Vec<String>, out: &mut ParamManifest) {
    match node {
        RecordNode::Map(entries) => {
            // A parameter serialises as { id, param: <tensor data> }.
            if let (Some(_), Some(param)) = (field(entries, "id"), field(entries, "param")) {
                if let Some(shape) = find_shape(param) {
                    out.insert(path.join("."), shape);
                }
                return;
            }
            for (key, child) in entries {
                path.push(key.clone());
                collect(child, path, out);
                path.pop();
            }
        }
        RecordNode::Seq(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(i.to_string());
                collect(child, path, out);
                path.pop();
            }
        }
        RecordNode::Int(_) | RecordNode::Other => {}
    }
}

fn find_shape(node: &RecordNode) -> Option<Vec<usize>> {
    let RecordNode::Map(entries) = node else {
        return None;
    };
    if let Some(RecordNode::Seq(dims)) = field(entries, "shape") {
        return dims
            .iter()
            .map(|d| match d {
                RecordNode::Int(v) => usize::try_from(*v).ok(),
                _ => None,
            })
            .collect();
    }
    entries.iter().find_map(|(_, child)| find_shape(child))
}

impl<'de> Deserialize<'de> for RecordNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = RecordNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a MessagePack record value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<RecordNode, E> {
        Ok(RecordNode::Other)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RecordNode, E> {
        Ok(u64::try_from(v).map(RecordNode::Int).unwrap_or(RecordNode::Other))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RecordNode, E> {
        Ok(RecordNode::Int(v))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<RecordNode, E> {
        Ok(RecordNode::Other)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<RecordNode, E> {
        Ok(RecordNode::Other)
    }

    // Tensor payloads; only their shape matters.
    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<RecordNode, E> {
        Ok(RecordNode::Other)
    }

    fn visit_none<E: de::Error>(self) -> Result<RecordNode, E> {
        Ok(RecordNode::Other)
    }

    fn visit_unit<E: de::Error>(self) -> Result<RecordNode, E> {
        Ok(RecordNode::Other)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<RecordNode, D::Error> {
        RecordNode::deserialize(d)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, d: D) -> Result<RecordNode, D::Error> {
        RecordNode::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RecordNode, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RecordNode::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RecordNode, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, RecordNode>()? {
            entries.push((key, value));
        }
        Ok(RecordNode::Map(entries))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::checkpoint::remap_rules;
    use crate::ml::model::LeukemiaCvtConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn default_manifest() -> ParamManifest {
        let model = LeukemiaCvtConfig::new().init::<TestBackend>(&Default::default());
        of_module::<TestBackend, _>(&model).unwrap()
    }

    #[test]
    fn test_model_manifest_lists_every_parameter() {
        let m = default_manifest();

        // 20 tensors per stage plus 4 in the head.
        assert_eq!(m.len(), 3 * 20 + 4, "{:#?}", m.keys().collect::<Vec<_>>());
        assert_eq!(m["stage1.embed.depthwise.weight"], vec![3, 1, 7, 7]);
        assert_eq!(m["stage1.embed.depthwise.bias"], vec![3]);
        assert_eq!(m["stage2.embed.layer_norm.gamma"], vec![96]);
        assert_eq!(m["stage3.transformer.attn.qkv.weight"], vec![192, 576]);
        assert_eq!(m["stage3.recalibration.fc1.weight"], vec![192, 12]);
        assert_eq!(m["head.norm.beta"], vec![192]);
        assert_eq!(m["head.fc.weight"], vec![192, 2]);
        assert!(!m.contains_key("stage1.recalibration.fc1.bias"));
    }

    #[test]
    fn test_pytorch_names_adapt_to_field_paths() {
        let expected = default_manifest();
        let rules    = remap_rules().unwrap();
        let entries  = [
            ("stage1_embed.layer_norm.weight", vec![32]),
            ("stage1_embed.depthwise.weight", vec![3, 1, 7, 7]),
            ("stage2_transformer.mlp.0.weight", vec![192, 96]),
            ("se1.fc1.weight", vec![2, 32]),
            ("head.0.bias", vec![192]),
            ("head.1.weight", vec![2, 192]),
        ]
        .map(|(k, s)| (k.to_string(), s));

        let adapted = adapt_pytorch(entries, &rules, &expected);
        assert_eq!(adapted["stage1.embed.layer_norm.gamma"], vec![32]);
        assert_eq!(adapted["stage1.embed.depthwise.weight"], vec![3, 1, 7, 7]);
        assert_eq!(adapted["stage2.transformer.mlp_in.weight"], vec![96, 192]);
        assert_eq!(adapted["stage1.recalibration.fc1.weight"], vec![32, 2]);
        assert_eq!(adapted["head.norm.beta"], vec![192]);
        assert_eq!(adapted["head.fc.weight"], vec![192, 2]);
        for (key, shape) in &adapted {
            assert_eq!(expected.get(key), Some(shape), "{key}");
        }
    }

    #[test]
    fn test_diff_reports_missing_extra_and_reshaped() {
        let expected = default_manifest();
        assert!(diff(&expected, &expected).is_empty());

        let mut supplied = expected.clone();
        supplied.remove("head.fc.bias");
        supplied.insert("stage4.weight".to_string(), vec![192, 999]);
        supplied.insert("head.norm.gamma".to_string(), vec![96]);

        let problems = diff(&expected, &supplied);
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("missing parameter 'head.fc.bias'")));
        assert!(problems.iter().any(|p| p.contains("unexpected parameter 'stage4.weight'")));
        assert!(problems.iter().any(|p| p.contains("'head.norm.gamma' has shape [96]")));
    }
}
