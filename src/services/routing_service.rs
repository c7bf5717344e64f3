// src/services/routing_service.rs

use crate::{
    common::error::AppError,
    db::{RoutingRepository, RuleScope},
    models::routing::{Candidate, CompiledRule, RouteTarget, RoutingDecision, RoutingMethod, RoutingMode},
};

#[derive(Clone)]
pub struct RoutingService {
    repo: RoutingRepository,
}

impl RoutingService {
    pub fn new(repo: RoutingRepository) -> Self {
        Self { repo }
    }

    /// Decide o(s) destino(s) de um candidato.
    ///
    /// Um destino explícito que resolve para um workspace ativo ganha direto
    /// (roteamento por prioridade). Caso contrário as regras do escopo são
    /// avaliadas; nenhum match resulta em `Unrouted`, que não é erro.
    pub async fn route(
        &self,
        explicit_destination: Option<&str>,
        candidate: &Candidate,
        scope: RuleScope<'_>,
        mode: RoutingMode,
    ) -> Result<RoutingDecision, AppError> {
        if let Some(destination_id) = explicit_destination.map(str::trim).filter(|d| !d.is_empty()) {
            match self.repo.find_active_workspace(destination_id).await? {
                Some(workspace) => {
                    return Ok(RoutingDecision {
                        method: RoutingMethod::Priority,
                        targets: vec![RouteTarget {
                            workspace_id: workspace.id,
                            callback_url: workspace.callback_url,
                            rule_id: None,
                            matched_product: candidate.product_type.clone(),
                            matched_zip: candidate.zip_code.clone(),
                        }],
                    });
                }
                None => {
                    tracing::info!(
                        destination_id,
                        "Destino explícito inexistente ou inativo, seguindo para as regras"
                    );
                }
            }
        }

        let rules = self.repo.load_rules(scope).await?;
        let matched = evaluate_rules(&rules, candidate, mode);

        if matched.is_empty() {
            return Ok(RoutingDecision::unrouted());
        }

        let targets = matched
            .into_iter()
            .map(|rule| RouteTarget {
                workspace_id: rule.workspace_id.clone(),
                callback_url: rule.callback_url.clone(),
                rule_id: Some(rule.id),
                matched_product: candidate.product_type.clone(),
                matched_zip: candidate.zip_code.clone(),
            })
            .collect();

        Ok(RoutingDecision { method: RoutingMethod::Auto, targets })
    }
}

// --- MOTOR DE AVALIAÇÃO ---

/// Avalia as regras em ordem crescente de prioridade; empate vai para a regra
/// criada primeiro (e, no mesmo instante, para o menor id).
///
/// `FirstMatch` devolve no máximo uma regra; `AllMatches` devolve todas,
/// inclusive várias apontando para o mesmo destino.
pub fn evaluate_rules<'r>(
    rules: &'r [CompiledRule],
    candidate: &Candidate,
    mode: RoutingMode,
) -> Vec<&'r CompiledRule> {
    let product = candidate.product_type.as_deref().map(|p| p.trim().to_lowercase());
    let zip = candidate.zip_code.as_deref().map(str::trim);

    let mut ordered: Vec<&CompiledRule> = rules.iter().collect();
    ordered.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });

    let mut matches = ordered
        .into_iter()
        .filter(|rule| rule.products.accepts(product.as_deref()) && rule.zips.accepts(zip));

    match mode {
        RoutingMode::FirstMatch => matches.next().into_iter().collect(),
        RoutingMode::AllMatches => matches.collect(),
    }
}
