//! Built-in check predicates for the eMAG/WCAG rule set
//!
//! Polarity is uniform: a check passes when the element is compliant.

use super::correlation;
use super::{Check, CheckResult};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;
use serde_json::json;

/// Fragment ids accepted as "skip to content" destinations
const CONTENT_IDS: &[&str] = &["conteudo", "main", "principal", "content"];

/// Event-handler attributes that count as inline JavaScript
pub const EVENT_ATTRIBUTES: &[&str] = &[
    "onload",
    "onunload",
    "onblur",
    "onchange",
    "onfocus",
    "onsearch",
    "onselect",
    "onsubmit",
    "onkeydown",
    "onkeypress",
    "onkeyup",
    "onclick",
    "ondblclick",
    "onmousedown",
    "onmousemove",
    "onmouseout",
    "onmouseover",
    "onmouseup",
    "onmousewheel",
    "oncopy",
    "oncut",
    "onpaste",
    "onabort",
];

static HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static OTHER_HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2, h3, h4, h5, h6").unwrap());
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("head > title").unwrap());
static NAV: Lazy<Selector> = Lazy::new(|| Selector::parse("nav").unwrap());
static MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());

static MEDIA_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(youtube\.com|youtu\.be|vimeo\.com|dailymotion\.com|soundcloud\.com|spotify\.com)")
        .unwrap()
});

/// The complete built-in check set
pub fn default_checks() -> Vec<Check> {
    let mut checks = vec![
        Check::new("imagem-alt-emag", |node, _| {
            Ok(CheckResult::from_bool(
                node.has_nonempty_attr("alt"),
                "A imagem não possui um atributo alt com texto descritivo",
            ))
        })
        .with_description("Imagens devem declarar o atributo alt"),
        Check::new("ancora-para-bloco", |node, ctx| {
            let Some(href) = node.attr("href") else {
                return Ok(CheckResult::pass());
            };
            let Some(fragment) = href.strip_prefix('#') else {
                return Ok(CheckResult::pass());
            };
            if fragment.is_empty() || ctx.document().anchor_target(fragment).is_none() {
                return Ok(CheckResult::fail(format!(
                    "A âncora aponta para \"{href}\", que não existe na página"
                )));
            }
            Ok(CheckResult::from_bool(
                node.visible,
                "A âncora para bloco de conteúdo está oculta",
            ))
        }),
        Check::new("primeiro-link-para-conteudo", |_, ctx| {
            let doc = ctx.document();
            let links: Vec<_> = doc
                .select(&ANCHORS)
                .into_iter()
                .filter(|n| n.visible)
                .collect();
            let Some(first) = links.first() else {
                return Ok(CheckResult::fail("A página não possui links visíveis"));
            };
            let Some(fragment) = first.attr("href").and_then(|h| h.strip_prefix('#')) else {
                return Ok(CheckResult::fail(
                    "O primeiro link da página não é uma âncora para o conteúdo",
                ));
            };
            if doc.anchor_target(fragment).is_none() {
                return Ok(CheckResult::fail(format!(
                    "O primeiro link aponta para \"#{fragment}\", que não existe"
                )));
            }
            Ok(CheckResult::from_bool(
                CONTENT_IDS.contains(&fragment.to_lowercase().as_str()),
                "O primeiro link não leva ao bloco de conteúdo principal",
            ))
        }),
        Check::new("css-inline-check", |node, _| {
            Ok(CheckResult::from_bool(
                !node.attrs.contains_key("style"),
                "O elemento usa CSS in-line através do atributo style",
            ))
        }),
        Check::new("css-internal-check", |node, _| {
            Ok(CheckResult::from_bool(
                node.tag != "style",
                "A página declara CSS interno em um elemento style",
            ))
        }),
        Check::new("js-inline-check", |node, _| {
            let found: Vec<&str> = EVENT_ATTRIBUTES
                .iter()
                .copied()
                .filter(|attr| node.attrs.contains_key(*attr))
                .collect();
            if found.is_empty() {
                Ok(CheckResult::pass())
            } else {
                Ok(
                    CheckResult::fail("O elemento usa JavaScript in-line em atributos de evento")
                        .with_data(json!({ "attributes": found })),
                )
            }
        }),
        Check::new("js-internal-check", |node, ctx| {
            if node.tag != "script" || node.attrs.contains_key("src") {
                return Ok(CheckResult::pass());
            }
            Ok(CheckResult::from_bool(
                ctx.document().text(node).is_empty(),
                "A página declara JavaScript interno em um elemento script",
            ))
        }),
        Check::new("check-has-heading", |_, ctx| {
            Ok(CheckResult::from_bool(
                !ctx.document().select(&HEADINGS).is_empty(),
                "A página não contém nenhum cabeçalho (h1 até h6)",
            ))
        })
        .with_description("Verifica se existe pelo menos um cabeçalho na página"),
        Check::new("check-heading-hierarchy", |_, ctx| {
            let mut current = 0u32;
            for heading in ctx.document().select(&HEADINGS) {
                let level = heading
                    .tag
                    .strip_prefix('h')
                    .and_then(|l| l.parse::<u32>().ok())
                    .unwrap_or(0);
                if level > current + 1 {
                    return Ok(CheckResult::fail(format!(
                        "Pulo de nível de cabeçalho: h{level} aparece sem um h{} anterior",
                        level - 1
                    )));
                }
                current = level;
            }
            Ok(CheckResult::pass())
        })
        .with_description("Garante que os cabeçalhos seguem uma hierarquia sequencial"),
        Check::new("check-only-h1", |_, ctx| {
            let doc = ctx.document();
            let h1 = doc.select(&H1).len();
            let others = doc.select(&OTHER_HEADINGS).len();
            Ok(CheckResult::from_bool(
                !(h1 > 0 && others == 0),
                "A página usa apenas h1, sem outros níveis de cabeçalho",
            ))
        }),
        Check::new("check-multiple-h1", |_, ctx| {
            let count = ctx.document().select(&H1).len();
            if count <= 1 {
                Ok(CheckResult::pass())
            } else {
                Ok(CheckResult::fail(format!(
                    "A página contém {count} elementos h1; deve haver apenas um"
                )))
            }
        }),
        Check::new("has-page-title", |_, ctx| {
            let doc = ctx.document();
            let title = doc
                .select(&TITLE)
                .first()
                .map(|n| doc.text(n))
                .unwrap_or_default();
            Ok(CheckResult::from_bool(
                !title.is_empty(),
                "O documento não possui um título descritivo",
            ))
        }),
        Check::new("has-lang", |node, _| {
            Ok(CheckResult::from_bool(
                node.has_nonempty_attr("lang"),
                "O elemento html não declara o idioma principal da página",
            ))
        }),
        Check::new("link-has-accessible-text", |node, ctx| {
            Ok(CheckResult::from_bool(
                !ctx.document().accessible_text(node).is_empty(),
                "O link não possui texto discernível",
            ))
        }),
        Check::new("input-has-label", |node, ctx| {
            if node.has_nonempty_attr("aria-label") || node.has_nonempty_attr("title") {
                return Ok(CheckResult::pass());
            }
            let doc = ctx.document();
            if let Some(id) = node.attr("id") {
                let labelled = doc
                    .nodes()
                    .iter()
                    .any(|n| n.tag == "label" && n.attr("for") == Some(id));
                if labelled {
                    return Ok(CheckResult::pass());
                }
            }
            if let Some(el) = doc.element(node) {
                for ancestor in el.ancestors() {
                    if ancestor
                        .value()
                        .as_element()
                        .is_some_and(|e| e.name().eq_ignore_ascii_case("label"))
                    {
                        return Ok(CheckResult::pass());
                    }
                }
            }
            Ok(CheckResult::fail(
                "O campo de formulário não possui rótulo associado",
            ))
        }),
        Check::new("frame-has-title", |node, _| {
            Ok(CheckResult::from_bool(
                node.has_nonempty_attr("title"),
                "O iframe não possui um atributo title descritivo",
            ))
        }),
        Check::new("landmarks-check", |_, ctx| {
            let doc = ctx.document();
            let missing: Vec<&str> = ["header", "nav", "main", "footer"]
                .into_iter()
                .filter(|tag| !doc.nodes().iter().any(|n| n.tag == *tag))
                .collect();
            if missing.is_empty() {
                Ok(CheckResult::pass())
            } else {
                Ok(CheckResult::fail(
                    "A página não utiliza as landmarks semânticas recomendadas",
                )
                .with_data(json!({ "missing": missing })))
            }
        }),
        Check::new("content-before-menu-check", |_, ctx| {
            let doc = ctx.document();
            let Some(first_nav) = doc.select(&NAV).first().map(|n| n.index) else {
                return Ok(CheckResult::pass());
            };
            if doc
                .select(&MAIN)
                .first()
                .is_some_and(|main| main.index < first_nav)
            {
                return Ok(CheckResult::pass());
            }
            let has_skip_anchor = doc.select(&ANCHORS).into_iter().any(|a| {
                a.index < first_nav
                    && a.attr("href")
                        .and_then(|h| h.strip_prefix('#'))
                        .is_some_and(|f| CONTENT_IDS.contains(&f.to_lowercase().as_str()))
            });
            Ok(CheckResult::from_bool(
                has_skip_anchor,
                "O menu de navegação aparece antes do conteúdo, sem âncora para pulá-lo",
            ))
        }),
        Check::new("tabindex-presence-check", |node, _| {
            Ok(CheckResult::from_bool(
                !node.attrs.contains_key("tabindex"),
                "O elemento usa o atributo tabindex",
            ))
        }),
        // none-group check: true when the disqualifying condition holds
        Check::new("tabindex-range-check", |node, _| {
            let positive = node
                .attr("tabindex")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .is_some_and(|v| v > 0);
            if positive {
                Ok(CheckResult::pass()
                    .with_message("O tabindex positivo altera a ordem natural de tabulação"))
            } else {
                Ok(CheckResult::absent())
            }
        }),
        // none-group check: true when two links touch without separating text
        Check::new("adjacent-links-check", |node, ctx| {
            match ctx.document().next_element_sibling(node) {
                Some((next, gap)) if next.tag == "a" && gap.is_empty() => {
                    Ok(CheckResult::pass()
                        .with_message("Links adjacentes sem texto de separação entre eles")
                        .with_data(json!({ "adjacent": next.html })))
                }
                _ => Ok(CheckResult::absent()),
            }
        }),
        Check::new("video-presence-check", |_, _| {
            Ok(CheckResult::incomplete(
                "Verifique manualmente se o vídeo oferece legendas e audiodescrição",
            ))
        }),
        Check::new("audio-presence-check", |_, _| {
            Ok(CheckResult::incomplete(
                "Verifique manualmente se o áudio oferece transcrição textual",
            ))
        }),
        Check::new("embedded-media-check", |node, _| {
            let source = node.attr("src").or_else(|| node.attr("data")).unwrap_or("");
            if MEDIA_HOST.is_match(source) {
                Ok(CheckResult::incomplete(
                    "Conteúdo multimídia incorporado: verifique legendas e alternativas",
                ))
            } else {
                Ok(CheckResult::pass())
            }
        }),
    ];
    checks.extend(correlation::checks());
    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckStatus;
    use crate::context::EvalContext;
    use crate::document::{AuditDocument, AuditNode};

    fn run_on(html: &str, check_id: &str, selector: &str) -> Vec<CheckStatus> {
        let doc = AuditDocument::parse(html);
        let ctx = EvalContext::detached(&doc);
        let checks = default_checks();
        let check = checks.iter().find(|c| c.id == check_id).unwrap();
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel)
            .iter()
            .map(|node| check.run(node, &ctx).unwrap().status)
            .collect()
    }

    fn first(html: &str, check_id: &str, selector: &str) -> CheckStatus {
        run_on(html, check_id, selector)[0]
    }

    fn node_of(doc: &AuditDocument, selector: &str) -> AuditNode {
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel)[0].clone()
    }

    #[test]
    fn test_imagem_alt() {
        let html = r#"<body><img src="a.png"><img src="b.png" alt="texto descritivo"><img src="c.png" alt="  "></body>"#;
        assert_eq!(
            run_on(html, "imagem-alt-emag", "img"),
            vec![CheckStatus::Fail, CheckStatus::Pass, CheckStatus::Fail]
        );
    }

    #[test]
    fn test_ancora_para_bloco() {
        let html = r##"<body>
            <a id="ok" href="#conteudo">pular</a>
            <a id="broken" href="#nada">quebrada</a>
            <a id="hidden" href="#conteudo" hidden>oculta</a>
            <a id="ext" href="https://example.com">externo</a>
            <div id="conteudo"></div>
        </body>"##;
        assert_eq!(first(html, "ancora-para-bloco", "#ok"), CheckStatus::Pass);
        assert_eq!(first(html, "ancora-para-bloco", "#broken"), CheckStatus::Fail);
        assert_eq!(first(html, "ancora-para-bloco", "#hidden"), CheckStatus::Fail);
        assert_eq!(first(html, "ancora-para-bloco", "#ext"), CheckStatus::Pass);
    }

    #[test]
    fn test_primeiro_link_para_conteudo() {
        let ok = r##"<body><a href="#conteudo">ir para conteúdo</a><div id="conteudo"></div></body>"##;
        assert_eq!(first(ok, "primeiro-link-para-conteudo", "body"), CheckStatus::Pass);

        let wrong_id = r##"<body><a href="#menu">menu</a><div id="menu"></div></body>"##;
        assert_eq!(
            first(wrong_id, "primeiro-link-para-conteudo", "body"),
            CheckStatus::Fail
        );

        let not_anchor = r#"<body><a href="/home">home</a><div id="conteudo"></div></body>"#;
        assert_eq!(
            first(not_anchor, "primeiro-link-para-conteudo", "body"),
            CheckStatus::Fail
        );

        // the first *visible* link is what counts
        let hidden_first = r##"<body><a href="/home" hidden>home</a><a href="#conteudo">pular</a><div id="conteudo"></div></body>"##;
        assert_eq!(
            first(hidden_first, "primeiro-link-para-conteudo", "body"),
            CheckStatus::Pass
        );
    }

    #[test]
    fn test_css_checks() {
        assert_eq!(
            first(r#"<body><p style="color:red">x</p></body>"#, "css-inline-check", "p"),
            CheckStatus::Fail
        );
        assert_eq!(
            first("<body><p>x</p></body>", "css-inline-check", "p"),
            CheckStatus::Pass
        );
        assert_eq!(
            first("<head><style>p{color:red}</style></head><body></body>", "css-internal-check", "style"),
            CheckStatus::Fail
        );
    }

    #[test]
    fn test_js_checks() {
        let html = r#"<body><button onclick="go()">x</button><button>y</button></body>"#;
        assert_eq!(
            run_on(html, "js-inline-check", "button"),
            vec![CheckStatus::Fail, CheckStatus::Pass]
        );

        let scripts = r#"<body><script>var x = 1;</script><script src="app.js"></script></body>"#;
        assert_eq!(
            run_on(scripts, "js-internal-check", "script"),
            vec![CheckStatus::Fail, CheckStatus::Pass]
        );
    }

    #[test]
    fn test_heading_checks() {
        let none = "<body><p>sem cabeçalho</p></body>";
        assert_eq!(first(none, "check-has-heading", "html"), CheckStatus::Fail);

        let skip = "<body><h1>a</h1><h3>pulo</h3></body>";
        assert_eq!(first(skip, "check-heading-hierarchy", "body"), CheckStatus::Fail);

        let sequential = "<body><h1>a</h1><h2>b</h2><h3>c</h3><h2>d</h2></body>";
        assert_eq!(
            first(sequential, "check-heading-hierarchy", "body"),
            CheckStatus::Pass
        );

        let only_h1 = "<body><h1>a</h1></body>";
        assert_eq!(first(only_h1, "check-only-h1", "body"), CheckStatus::Fail);

        let two_h1 = "<body><h1>a</h1><h1>b</h1><h2>c</h2></body>";
        assert_eq!(first(two_h1, "check-multiple-h1", "body"), CheckStatus::Fail);
        assert_eq!(first(two_h1, "check-only-h1", "body"), CheckStatus::Pass);
    }

    #[test]
    fn test_title_and_lang() {
        let ok = "<html lang=\"pt-BR\"><head><title>Página</title></head><body></body></html>";
        assert_eq!(first(ok, "has-page-title", "html"), CheckStatus::Pass);
        assert_eq!(first(ok, "has-lang", "html"), CheckStatus::Pass);

        let missing = "<html><head><title>  </title></head><body></body></html>";
        assert_eq!(first(missing, "has-page-title", "html"), CheckStatus::Fail);
        assert_eq!(first(missing, "has-lang", "html"), CheckStatus::Fail);
    }

    #[test]
    fn test_link_text_and_labels() {
        let links = r#"<body><a id="t" href="/1">texto</a><a id="e" href="/2"></a></body>"#;
        assert_eq!(first(links, "link-has-accessible-text", "#t"), CheckStatus::Pass);
        assert_eq!(first(links, "link-has-accessible-text", "#e"), CheckStatus::Fail);

        let inputs = r#"<body>
            <label for="nome">Nome</label><input id="nome" type="text">
            <label>Idade <input id="idade" type="text"></label>
            <input id="solto" type="text">
            <input id="aria" type="text" aria-label="Busca">
        </body>"#;
        assert_eq!(first(inputs, "input-has-label", "#nome"), CheckStatus::Pass);
        assert_eq!(first(inputs, "input-has-label", "#idade"), CheckStatus::Pass);
        assert_eq!(first(inputs, "input-has-label", "#solto"), CheckStatus::Fail);
        assert_eq!(first(inputs, "input-has-label", "#aria"), CheckStatus::Pass);

        let frames = r#"<body><iframe id="ok" title="Mapa"></iframe><iframe id="no"></iframe></body>"#;
        assert_eq!(first(frames, "frame-has-title", "#ok"), CheckStatus::Pass);
        assert_eq!(first(frames, "frame-has-title", "#no"), CheckStatus::Fail);
    }

    #[test]
    fn test_landmarks_reports_missing() {
        let html = "<body><nav></nav><main></main></body>";
        let doc = AuditDocument::parse(html);
        let ctx = EvalContext::detached(&doc);
        let checks = default_checks();
        let check = checks.iter().find(|c| c.id == "landmarks-check").unwrap();
        let body = node_of(&doc, "body");
        let result = check.run(&body, &ctx).unwrap();
        assert_eq!(result.status, CheckStatus::Fail);
        let missing = result.data.unwrap()["missing"].clone();
        assert_eq!(missing, serde_json::json!(["header", "footer"]));
    }

    #[test]
    fn test_content_before_menu() {
        let ok = r##"<body><a href="#conteudo">pular</a><nav></nav><div id="conteudo"></div></body>"##;
        assert_eq!(first(ok, "content-before-menu-check", "body"), CheckStatus::Pass);

        let main_first = "<body><main></main><nav></nav></body>";
        assert_eq!(
            first(main_first, "content-before-menu-check", "body"),
            CheckStatus::Pass
        );

        let menu_first = "<body><nav></nav><main></main></body>";
        assert_eq!(
            first(menu_first, "content-before-menu-check", "body"),
            CheckStatus::Fail
        );

        let no_nav = "<body><main></main></body>";
        assert_eq!(first(no_nav, "content-before-menu-check", "body"), CheckStatus::Pass);
    }

    #[test]
    fn test_tabindex_checks() {
        let html = r#"<body><a id="p" tabindex="3"></a><a id="z" tabindex="0"></a><a id="n" tabindex="-1"></a></body>"#;
        // none-group polarity: Pass status means the condition holds
        assert_eq!(first(html, "tabindex-range-check", "#p"), CheckStatus::Pass);
        assert_eq!(first(html, "tabindex-range-check", "#z"), CheckStatus::Fail);
        assert_eq!(first(html, "tabindex-range-check", "#n"), CheckStatus::Fail);
        assert_eq!(first(html, "tabindex-presence-check", "#z"), CheckStatus::Fail);
    }

    #[test]
    fn test_adjacent_links() {
        let html = r#"<body><a id="a1" href="/1">um</a><a id="a2" href="/2">dois</a> | <a id="a3" href="/3">tres</a></body>"#;
        assert_eq!(first(html, "adjacent-links-check", "#a1"), CheckStatus::Pass);
        assert_eq!(first(html, "adjacent-links-check", "#a2"), CheckStatus::Fail);
        assert_eq!(first(html, "adjacent-links-check", "#a3"), CheckStatus::Fail);
    }

    #[test]
    fn test_media_checks() {
        assert_eq!(
            first("<body><video src=\"v.mp4\"></video></body>", "video-presence-check", "video"),
            CheckStatus::Incomplete
        );
        assert_eq!(
            first(
                r#"<body><iframe src="https://www.youtube.com/embed/x"></iframe></body>"#,
                "embedded-media-check",
                "iframe"
            ),
            CheckStatus::Incomplete
        );
        assert_eq!(
            first(
                r#"<body><iframe src="https://example.com/page"></iframe></body>"#,
                "embedded-media-check",
                "iframe"
            ),
            CheckStatus::Pass
        );
    }
}
