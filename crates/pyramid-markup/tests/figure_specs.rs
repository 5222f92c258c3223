//! Rendering properties over generated spec documents

use proptest::prelude::*;
use pyramid_markup::figure_spec::{self, RenderOptions};

#[derive(Debug, Clone)]
struct Spec {
    id: String,
    alt: String,
    src: Option<String>,
    caption: Option<String>,
}

impl Spec {
    fn fence(&self) -> String {
        let mut out = format!("```figure\nid: {}\nprompt: draw {}\nalt: {}\n", self.id, self.id, self.alt);
        if let Some(caption) = &self.caption {
            out.push_str(&format!("caption: {caption}\n"));
        }
        if let Some(src) = &self.src {
            out.push_str(&format!("src: {src}\n"));
        }
        out.push_str("```\n");
        out
    }
}

fn document() -> impl Strategy<Value = (String, Vec<Spec>)> {
    let spec = (
        "[a-z][a-z ]{0,10}[a-z]",
        proptest::option::of("https://cdn\\.example\\.com/[a-z]{1,8}\\.png"),
        proptest::option::of("[A-Z][a-z ]{0,10}[a-z]"),
    );
    proptest::collection::vec(spec, 0..8).prop_map(|raw| {
        let specs: Vec<Spec> = raw
            .into_iter()
            .enumerate()
            .map(|(i, (alt, src, caption))| Spec {
                id: format!("fig-{i}"),
                alt,
                src,
                caption,
            })
            .collect();
        let mut doc = String::from("# Chapter\n\n");
        for (i, spec) in specs.iter().enumerate() {
            doc.push_str(&format!("Paragraph {i}.\n\n"));
            doc.push_str(&spec.fence());
            doc.push('\n');
        }
        (doc, specs)
    })
}

proptest! {
    #[test]
    fn generated_documents_validate((doc, specs) in document()) {
        prop_assert!(figure_spec::validate(&doc).is_empty());
        prop_assert_eq!(figure_spec::parse(&doc).unwrap().len(), specs.len());
    }

    #[test]
    fn rendering_consumes_locked_specs((doc, specs) in document()) {
        let locked = specs.iter().filter(|s| s.src.is_some()).count();

        let kept = figure_spec::render(&doc, RenderOptions::default()).unwrap();
        prop_assert_eq!(figure_spec::parse(&kept).unwrap().len(), specs.len() - locked);
        prop_assert_eq!(kept.matches("![").count(), locked);

        let stripped = figure_spec::render(&doc, RenderOptions { strip_pending: true }).unwrap();
        prop_assert!(figure_spec::parse(&stripped).unwrap().is_empty());
        prop_assert_eq!(stripped.matches("<!-- figure pending:").count(), specs.len() - locked);
    }

    #[test]
    fn pending_ids_are_the_unlocked_ones((doc, specs) in document()) {
        let expected: Vec<String> = specs
            .iter()
            .filter(|s| s.src.is_none())
            .map(|s| s.id.clone())
            .collect();
        let found: Vec<String> = figure_spec::pending(&doc)
            .unwrap()
            .into_iter()
            .map(|l| l.spec.id.to_string())
            .collect();
        prop_assert_eq!(found, expected);
    }
}
