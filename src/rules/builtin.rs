//! Built-in rule set: WCAG base rules plus the eMAG 3.1 profile
//!
//! The declarations are data; the evaluation logic lives in the engine.

use super::{Rule, RuleMetadata, RulePatch};
use crate::results::Impact;

const EMAG_R11: &str = "https://emag.governoeletronico.gov.br/#r1.1";
const EMAG_R13: &str = "https://emag.governoeletronico.gov.br/#r1.3";
const EMAG_R15: &str = "https://emag.governoeletronico.gov.br/#r1.5";
const EMAG_R17: &str = "https://emag.governoeletronico.gov.br/#r1.7";
const EMAG_R35: &str = "https://emag.governoeletronico.gov.br/#r3.5";
const EMAG_R36: &str = "https://emag.governoeletronico.gov.br/#r3.6";
const EMAG_R55: &str = "https://emag.governoeletronico.gov.br/#r5.5";

fn rule(
    id: &str,
    selector: &str,
    impact: Impact,
    tags: &[&str],
    help: &str,
    help_url: &str,
    description: &str,
) -> Rule {
    Rule {
        id: id.to_string(),
        selector: selector.to_string(),
        any: Vec::new(),
        all: Vec::new(),
        none: Vec::new(),
        enabled: true,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        impact,
        metadata: RuleMetadata {
            help: help.to_string(),
            help_url: help_url.to_string(),
            description: description.to_string(),
            page_level: false,
        },
    }
}

fn any(mut r: Rule, checks: &[&str]) -> Rule {
    r.any = checks.iter().map(|c| c.to_string()).collect();
    r
}

fn all(mut r: Rule, checks: &[&str]) -> Rule {
    r.all = checks.iter().map(|c| c.to_string()).collect();
    r
}

fn none(mut r: Rule, checks: &[&str]) -> Rule {
    r.none = checks.iter().map(|c| c.to_string()).collect();
    r
}

fn page_level(mut r: Rule) -> Rule {
    r.metadata.page_level = true;
    r
}

/// The built-in rule set, WCAG base rules first
pub fn default_rules() -> Vec<Rule> {
    vec![
        // --- WCAG base ---
        page_level(any(
            rule(
                "document-title",
                "html",
                Impact::Serious,
                &["wcag2a"],
                "A página deve ter um elemento title descritivo.",
                "https://dequeuniversity.com/rules/axe/4.4/document-title",
                "Garante que todo documento HTML possui um título não vazio.",
            ),
            &["has-page-title"],
        )),
        page_level(any(
            rule(
                "html-has-lang",
                "html",
                Impact::Serious,
                &["wcag2a"],
                "O elemento html deve declarar um atributo lang.",
                "https://dequeuniversity.com/rules/axe/4.4/html-has-lang",
                "Garante que o idioma principal da página está declarado.",
            ),
            &["has-lang"],
        )),
        any(
            rule(
                "link-name",
                "a[href]",
                Impact::Serious,
                &["wcag2a"],
                "Links devem ter texto discernível.",
                "https://dequeuniversity.com/rules/axe/4.4/link-name",
                "Garante que todo link possui um nome acessível para leitores de tela.",
            ),
            &["link-has-accessible-text"],
        ),
        any(
            rule(
                "input-label",
                "input:not([type=hidden]):not([type=button]):not([type=submit]):not([type=reset]), select, textarea",
                Impact::Critical,
                &["wcag2a"],
                "Campos de formulário devem ter rótulos.",
                "https://dequeuniversity.com/rules/axe/4.4/label",
                "Garante que todo campo de formulário possui um rótulo associado.",
            ),
            &["input-has-label"],
        ),
        any(
            rule(
                "frame-title",
                "iframe",
                Impact::Serious,
                &["wcag2a"],
                "Iframes devem ter um atributo title.",
                "https://dequeuniversity.com/rules/axe/4.4/frame-title",
                "Garante que conteúdo incorporado é identificável por tecnologia assistiva.",
            ),
            &["frame-has-title"],
        ),
        // --- eMAG 3.1 ---
        any(
            rule(
                "img-sem-alt-emag",
                "img",
                Impact::Serious,
                &["emag", "wcag2a", "imagem"],
                "EMAG 3.1 R3.6.1 - Imagem sem declaração do atributo ALT.",
                EMAG_R36,
                "Deve ser fornecida uma descrição para as imagens da página, utilizando-se, para tanto o atributo alt.",
            ),
            &["imagem-alt-emag"],
        ),
        any(
            rule(
                "emag-ancoras-bloco-existente",
                "a[href^=\"#\"]",
                Impact::Moderate,
                &["emag", "barra-acessibilidade", "atalhos"],
                "EMAG 3.1 R1.5 - Âncora aponta para bloco inexistente ou oculto.",
                EMAG_R15,
                "Âncoras internas devem apontar para blocos de conteúdo existentes e visíveis.",
            ),
            &["ancora-para-bloco"],
        ),
        page_level(all(
            rule(
                "emag-ancoras-acesskey-unico",
                "body",
                Impact::Moderate,
                &["emag", "barra-acessibilidade", "atalhos"],
                "EMAG 3.1 R1.5 - Accesskeys duplicadas na página.",
                EMAG_R15,
                "Cada atalho de teclado (accesskey) deve ser único na página.",
            ),
            &["accesskey-unico"],
        )),
        page_level(any(
            rule(
                "emag-ancoras-primeiro-link",
                "body",
                Impact::Moderate,
                &["emag", "barra-acessibilidade", "atalhos"],
                "EMAG 3.1 R1.5 - Falta de âncora para pular ao conteúdo.",
                EMAG_R15,
                "O primeiro link da página deve permitir pular para o bloco de conteúdo principal.",
            ),
            &["primeiro-link-para-conteudo"],
        )),
        any(
            rule(
                "css-inline",
                "[style]",
                Impact::Minor,
                &["emag", "padrões", "html"],
                "EMAG 3.1 R1.1.3 - Presença de CSS(s) in-line.",
                EMAG_R11,
                "Evitar o uso de CSS inline. Respeite os padrões Web HTML. Utilize folhas de estilo externas.",
            ),
            &["css-inline-check"],
        ),
        any(
            rule(
                "css-internal",
                "style",
                Impact::Minor,
                &["emag", "padrões", "html"],
                "EMAG 3.1 R1.1.4 - Presença de CSS(s) interno.",
                EMAG_R11,
                "Evitar o uso de CSS interno. Respeite os padrões Web HTML. Utilize folhas de estilo externas.",
            ),
            &["css-internal-check"],
        ),
        any(
            rule(
                "js-inline",
                "[onload], [onunload], [onblur], [onchange], [onfocus], [onsearch], [onselect], [onsubmit], [onkeydown], [onkeypress], [onkeyup], [onclick], [ondblclick], [onmousedown], [onmousemove], [onmouseout], [onmouseover], [onmouseup], [onmousewheel], [oncopy], [oncut], [onpaste], [onabort]",
                Impact::Minor,
                &["emag", "padrões", "html", "javascript"],
                "EMAG 3.1 R1.1.5 - Presença de javascript(s) in-line.",
                EMAG_R11,
                "Evitar o uso de JavaScript inline em atributos de evento. Utilize arquivos JavaScript externos.",
            ),
            &["js-inline-check"],
        ),
        any(
            rule(
                "js-internal",
                "script",
                Impact::Minor,
                &["emag", "padrões", "html", "javascript"],
                "EMAG 3.1 R1.1.6 - Presença de javascript(s) interno.",
                EMAG_R11,
                "Evitar o uso de JavaScript interno. Utilize arquivos JavaScript externos sempre que possível.",
            ),
            &["js-internal-check"],
        ),
        page_level(any(
            rule(
                "emag-has-heading",
                "html",
                Impact::Serious,
                &["emag", "html", "heading"],
                "EMAG 3.1 R1.3.1 - Inclua pelo menos um cabeçalho (<h1> até <h6>) na página.",
                EMAG_R13,
                "Verifica se a página contém pelo menos um cabeçalho (<h1> até <h6>).",
            ),
            &["check-has-heading"],
        )),
        page_level(any(
            rule(
                "emag-heading-hierarchy",
                "body",
                Impact::Serious,
                &["emag", "html", "heading"],
                "EMAG 3.1 R1.3.2 - Use cabeçalhos de forma sequencial, sem pular níveis.",
                EMAG_R13,
                "Verifica se a hierarquia dos cabeçalhos está correta (não há pulos de nível).",
            ),
            &["check-heading-hierarchy"],
        )),
        page_level(any(
            rule(
                "emag-only-h1",
                "body",
                Impact::Moderate,
                &["emag", "html", "heading"],
                "EMAG 3.1 R1.3.4 - Utilize outros níveis de cabeçalho além do <h1>.",
                EMAG_R13,
                "Verifica se foi usado apenas <h1> sem outros níveis de cabeçalho.",
            ),
            &["check-only-h1"],
        )),
        page_level(any(
            rule(
                "emag-multiple-h1",
                "body",
                Impact::Serious,
                &["emag", "html", "heading"],
                "EMAG 3.1 R1.3.6 - Use apenas um <h1> para definir o título principal da página.",
                EMAG_R13,
                "Verifica se há mais de um <h1> na página.",
            ),
            &["check-multiple-h1"],
        )),
        page_level(any(
            rule(
                "emag-semantic-landmarks-missing",
                "body",
                Impact::Moderate,
                &["emag", "html", "semantica"],
                "EMAG 3.1 R1.3 - Landmarks semânticas recomendadas ausentes.",
                EMAG_R13,
                "A página deve estruturar o conteúdo com header, nav, main e footer.",
            ),
            &["landmarks-check"],
        )),
        page_level(any(
            rule(
                "emag-content-before-menu",
                "body",
                Impact::Moderate,
                &["emag", "html", "semantica"],
                "EMAG 3.1 R1.7 - Disponibilize o conteúdo antes do menu, ou uma âncora para pulá-lo.",
                EMAG_R17,
                "O bloco de conteúdo deve vir antes do menu na ordem do documento, ou haver âncora que pule o menu.",
            ),
            &["content-before-menu-check"],
        )),
        any(
            rule(
                "emag-tabindex-presence",
                "[tabindex]",
                Impact::Minor,
                &["emag", "teclado"],
                "EMAG 3.1 R2.1 - Evite o uso do atributo tabindex.",
                EMAG_R15,
                "A ordem de tabulação deve seguir a ordem natural do documento, sem tabindex.",
            ),
            &["tabindex-presence-check"],
        ),
        none(
            rule(
                "emag-tabindex-range",
                "[tabindex]",
                Impact::Moderate,
                &["emag", "teclado"],
                "EMAG 3.1 R2.1 - Tabindex positivo altera a ordem de tabulação.",
                EMAG_R15,
                "Valores positivos de tabindex quebram a ordem natural de navegação por teclado.",
            ),
            &["tabindex-range-check"],
        ),
        none(
            rule(
                "emag-adjacent-links-without-separation",
                "a[href]",
                Impact::Moderate,
                &["emag", "link"],
                "EMAG 3.1 R3.5 - Links adjacentes sem separação.",
                EMAG_R35,
                "Links adjacentes devem ser separados por texto ou elemento que não seja link.",
            ),
            &["adjacent-links-check"],
        ),
        page_level(any(
            rule(
                "emag-broken-links",
                "a[href]",
                Impact::Serious,
                &["emag", "link"],
                "EMAG 3.1 R3.5 - Link aponta para destino inalcançável.",
                EMAG_R35,
                "Links não devem apontar para destinos quebrados ou inexistentes.",
            ),
            &["link-reachable-check"],
        )),
        any(
            rule(
                "emag-duplicate-link-text",
                "a[href]",
                Impact::Moderate,
                &["emag", "link"],
                "EMAG 3.1 R3.5.11 - Links com o mesmo texto apontam para destinos diferentes.",
                EMAG_R35,
                "Links com o mesmo texto devem apontar para o mesmo destino.",
            ),
            &["duplicate-link-text-check"],
        ),
        any(
            rule(
                "emag-same-href-different-text",
                "a[href]",
                Impact::Moderate,
                &["emag", "link"],
                "EMAG 3.1 R3.5.10 - Links para o mesmo destino com textos diferentes.",
                EMAG_R35,
                "Links que apontam para o mesmo destino devem usar o mesmo texto.",
            ),
            &["same-href-text-check"],
        ),
        page_level(any(
            rule(
                "emag-video-presence",
                "video",
                Impact::Moderate,
                &["emag", "multimidia"],
                "EMAG 3.1 R5.5 - Vídeo presente: forneça legendas e audiodescrição.",
                EMAG_R55,
                "Conteúdo em vídeo requer alternativas acessíveis (legendas, audiodescrição).",
            ),
            &["video-presence-check"],
        )),
        page_level(any(
            rule(
                "emag-audio-presence",
                "audio",
                Impact::Moderate,
                &["emag", "multimidia"],
                "EMAG 3.1 R5.5 - Áudio presente: forneça transcrição textual.",
                EMAG_R55,
                "Conteúdo em áudio requer transcrição textual.",
            ),
            &["audio-presence-check"],
        )),
        page_level(any(
            rule(
                "emag-video-content-presence",
                "iframe[src], embed[src], object[data]",
                Impact::Moderate,
                &["emag", "multimidia"],
                "EMAG 3.1 R5.5 - Multimídia incorporada: verifique alternativas acessíveis.",
                EMAG_R55,
                "Players de vídeo ou áudio incorporados requerem legendas e alternativas.",
            ),
            &["embedded-media-check"],
        )),
    ]
}

/// Patches the eMAG profile applies over the WCAG base rules: the page
/// title and language requirements are also eMAG recommendations, so those
/// rules gain the `emag` tag without being redefined.
pub fn emag_profile_patches() -> Vec<(String, RulePatch)> {
    let emag_tag = |help: Option<&str>| RulePatch {
        tags: vec!["emag".to_string()],
        help: help.map(|h| h.to_string()),
        ..Default::default()
    };
    vec![
        (
            "document-title".to_string(),
            emag_tag(Some("EMAG 3.1 R3.1 - A página deve ter um título descritivo e informativo.")),
        ),
        ("html-has-lang".to_string(), emag_tag(None)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::default_checks;
    use std::collections::HashSet;

    #[test]
    fn test_rule_ids_unique() {
        let rules = default_rules();
        let ids: HashSet<_> = rules.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_every_referenced_check_exists() {
        let checks: HashSet<String> = default_checks().into_iter().map(|c| c.id).collect();
        for rule in default_rules() {
            for check_id in rule.check_ids() {
                assert!(
                    checks.contains(check_id),
                    "rule {} references missing check {}",
                    rule.id,
                    check_id
                );
            }
        }
    }

    #[test]
    fn test_every_rule_has_metadata_and_checks() {
        for rule in default_rules() {
            assert!(!rule.metadata.help.is_empty(), "{} missing help", rule.id);
            assert!(
                rule.metadata.help_url.starts_with("https://"),
                "{} missing help url",
                rule.id
            );
            assert!(!rule.metadata.description.is_empty());
            assert!(
                rule.check_ids().next().is_some(),
                "{} binds no checks",
                rule.id
            );
        }
    }

    #[test]
    fn test_emag_rules_tagged() {
        let rules = default_rules();
        let emag_count = rules.iter().filter(|r| r.tags.iter().any(|t| t == "emag")).count();
        assert!(emag_count >= 15);
    }

    #[test]
    fn test_profile_patches_target_existing_rules() {
        let rules = default_rules();
        for (id, patch) in emag_profile_patches() {
            assert!(rules.iter().any(|r| r.id == id), "patch targets missing rule {id}");
            assert!(patch.tags.contains(&"emag".to_string()));
        }
    }

    #[test]
    fn test_selectors_compile() {
        for rule in default_rules() {
            assert!(
                scraper::Selector::parse(&rule.selector).is_ok(),
                "rule {} has invalid selector {}",
                rule.id,
                rule.selector
            );
        }
    }
}
