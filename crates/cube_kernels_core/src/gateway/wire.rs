//! JSON decoding of remote store list payloads.
//!
//! # Responsibility
//! - Decode kernel and pool list bodies into model types.
//! - Reject malformed data as `InvalidResponse` before it reaches a board.
//!
//! # Invariants
//! - Decoders never return partially decoded collections.
//! - Decoded kernels have `card_count` consistent with nested members.
//! - Every decoded record carries a server id.

use crate::gateway::{GatewayError, GatewayResult};
use crate::model::kernel::{CandidateCard, Kernel};

pub fn decode_candidates(body: &str) -> GatewayResult<Vec<CandidateCard>> {
    let candidates: Vec<CandidateCard> = serde_json::from_str(body)?;
    if let Some(record) = candidates.iter().find(|record| record.id.is_none()) {
        return Err(GatewayError::InvalidResponse(format!(
            "candidate for card {} has no id",
            record.card.id
        )));
    }
    Ok(candidates)
}

pub fn decode_kernels(body: &str) -> GatewayResult<Vec<Kernel>> {
    let kernels: Vec<Kernel> = serde_json::from_str(body)?;
    for kernel in &kernels {
        check_kernel(kernel)?;
    }
    Ok(kernels)
}

fn check_kernel(kernel: &Kernel) -> GatewayResult<()> {
    if kernel.card_count != kernel.cards.len() {
        return Err(GatewayError::InvalidResponse(format!(
            "kernel {} reports card_count {} with {} members",
            kernel.id,
            kernel.card_count,
            kernel.cards.len()
        )));
    }
    if let Some(member) = kernel.cards.iter().find(|member| member.id.is_none()) {
        return Err(GatewayError::InvalidResponse(format!(
            "kernel {} member for card {} has no id",
            kernel.id, member.card.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{decode_candidates, decode_kernels};
    use crate::gateway::GatewayError;

    const KERNELS_BODY: &str = r#"[
        {
            "id": 3,
            "name": "Reanimator",
            "order": 0,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-02T10:00:00.123456Z",
            "card_count": 1,
            "cards": [
                {
                    "id": 40,
                    "added_at": "2024-05-02T10:00:00Z",
                    "card": {
                        "id": 7,
                        "scryfall_id": "0000579f-7b35-4ed3-b44c-db2a538066fe",
                        "name": "Entomb",
                        "cmc": 1.0,
                        "color_identity": ["B"],
                        "image_uris": {"normal": "https://img/entomb.jpg"},
                        "card_faces": [],
                        "layout": "normal"
                    }
                }
            ]
        }
    ]"#;

    #[test]
    fn decode_kernels_reads_nested_members() {
        let kernels = decode_kernels(KERNELS_BODY).unwrap();
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].card_ids(), vec![7]);
        assert_eq!(kernels[0].cards[0].id, Some(40));
        assert_eq!(kernels[0].cards[0].card.image_uri(0), Some("https://img/entomb.jpg"));
    }

    #[test]
    fn decode_kernels_rejects_inconsistent_count() {
        let body = KERNELS_BODY.replace("\"card_count\": 1", "\"card_count\": 4");
        let err = decode_kernels(&body).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(message) if message.contains("card_count")));
    }

    #[test]
    fn decode_candidates_rejects_malformed_json_and_missing_ids() {
        assert!(matches!(
            decode_candidates("{not json"),
            Err(GatewayError::InvalidResponse(_))
        ));

        let body = r#"[{"card": {"id": 1, "scryfall_id": "0000579f-7b35-4ed3-b44c-db2a538066fe", "name": "Opt"}}]"#;
        assert!(matches!(
            decode_candidates(body),
            Err(GatewayError::InvalidResponse(message)) if message.contains("no id")
        ));
    }
}
