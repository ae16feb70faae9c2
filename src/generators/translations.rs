use anyhow::Result;
use log::info;
use super::{GenerationContext, GenerationReport, Generator};
use crate::naming;
use crate::template::Tokens;

/// English language files with the titles and buttons the admin views use.
pub struct TranslationsGenerator;

impl Generator for TranslationsGenerator {
    fn name(&self) -> &'static str {
        "translations"
    }

    fn execute(&self, ctx: &GenerationContext) -> Result<GenerationReport> {
        info!("Generating Translations");
        let mut report = GenerationReport::default();
        let dir = ctx.module.path().join("Resources/lang/en");

        for table in ctx.info.tables() {
            let entity = naming::entity_name(table);
            if naming::is_translation_entity(&entity) {
                continue;
            }

            let lower = entity.to_lowercase();
            let plural = naming::plural(&lower);
            let tokens = Tokens::new()
                .with("ENTITY", entity.as_str())
                .with("ENTITIES", naming::plural(&entity))
                .with("LOWERCASE_SINGLE_ENTITY", lower.as_str())
                .with("LOWERCASE_PLURAL_ENTITY", plural.as_str());
            let target = dir.join(format!("{}.php", plural));

            if let Err(e) = ctx.write(&mut report, "translation.txt", &tokens, &target, "translations") {
                report.fail(&format!("translations for {}", entity), e);
            }
        }

        Ok(report)
    }
}
