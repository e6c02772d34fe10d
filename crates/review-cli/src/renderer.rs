use ascii_tree::{write_tree, Tree};
use review_core::{CollectionView, Notice};
use review_types::{ImprovedPrompt, Prompt, TestCase};
use std::fmt;

/// Formats the percent-correct metric; `None` is shown as unknown.
pub fn format_metric(metric: Option<f64>) -> String {
    match metric {
        None => "unknown".to_string(),
        Some(value) if value.fract() == 0.0 => format!("{value:.0}%"),
        Some(value) => format!("{value:.1}%"),
    }
}

/// Renders the collection of the active prompt as an ASCII tree.
///
/// The root carries the prompt name and metric, each row becomes a leaf.
pub fn render_collection(
    prompt: &Prompt,
    view: &CollectionView<'_>,
    metric: Option<f64>,
) -> Result<String, fmt::Error> {
    let root_label = format!(
        "{} [{}] (Correct: {})",
        prompt.name,
        prompt.id,
        format_metric(metric)
    );

    let children = match view {
        CollectionView::NoData => vec![Tree::Leaf(vec!["no data".to_string()])],
        CollectionView::Empty => vec![Tree::Leaf(vec!["no test cases".to_string()])],
        CollectionView::Rows(rows) => rows.iter().map(render_row).collect(),
    };

    let mut buffer = String::new();
    write_tree(&mut buffer, &Tree::Node(root_label, children))?;
    Ok(buffer)
}

fn render_row(case: &TestCase) -> Tree {
    let status_icon = if case.is_correct { "✅" } else { "❌" };
    let id = case
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "new".to_string());
    let mut lines = vec![format!("{status_icon} #{id} {} => {}", case.input, case.output)];
    if !case.reason.is_empty() {
        lines.push(format!("reason: {}", case.reason));
    }
    Tree::Leaf(lines)
}

pub fn render_prompts(prompts: &[Prompt]) -> String {
    if prompts.is_empty() {
        return "no prompts".to_string();
    }
    prompts
        .iter()
        .map(|prompt| {
            format!(
                "[{:3}] {} ({})",
                prompt.id, prompt.name, prompt.model_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_improved(prompt: &Prompt, improved: &ImprovedPrompt) -> String {
    format!(
        "Original ({}):\n  {}\nImproved:\n  {}",
        prompt.name, prompt.prompt_text, improved.improved_prompt
    )
}

pub fn render_notice(notice: &Notice) -> String {
    format!("[{:?}] {}", notice.severity, notice.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn prompt() -> Prompt {
        Prompt::new(1, "arithmetic", "Add the numbers.", "gemini-1.5-flash")
    }

    #[rstest]
    #[case(None, "unknown")]
    #[case(Some(0.0), "0%")]
    #[case(Some(67.0), "67%")]
    #[case(Some(66.666), "66.7%")]
    fn test_format_metric(#[case] metric: Option<f64>, #[case] expected: &str) {
        assert_eq!(format_metric(metric), expected);
    }

    #[test]
    fn test_render_rows() {
        let rows = vec![
            TestCase::new("2+2", "4", true, "ok").with_id(1),
            TestCase::new("2+3", "6", false, "").with_id(2),
        ];
        let rendered =
            render_collection(&prompt(), &CollectionView::Rows(&rows), Some(50.0)).unwrap();

        assert!(rendered.contains("arithmetic [1] (Correct: 50%)"));
        assert!(rendered.contains("✅ #1 2+2 => 4"));
        assert!(rendered.contains("reason: ok"));
        assert!(rendered.contains("❌ #2 2+3 => 6"));
        assert_eq!(rendered.matches("reason:").count(), 1);
    }

    #[rstest]
    #[case(CollectionView::NoData, None, "no data")]
    #[case(CollectionView::Empty, Some(0.0), "no test cases")]
    fn test_render_without_rows(
        #[case] view: CollectionView<'static>,
        #[case] metric: Option<f64>,
        #[case] expected: &str,
    ) {
        let rendered = render_collection(&prompt(), &view, metric).unwrap();
        assert!(rendered.contains(expected));
        assert!(rendered.contains(&format_metric(metric)));
    }

    #[test]
    fn test_render_prompts() {
        assert_eq!(render_prompts(&[]), "no prompts");
        assert_eq!(
            render_prompts(&[prompt()]),
            "[  1] arithmetic (gemini-1.5-flash)"
        );
    }
}
