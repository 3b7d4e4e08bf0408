/**
 * DISPATCH - Boucles de traduction (une par sens)
 *
 * - inbound  : bus -> fichier de commandes. Fail-fast : une écriture ratée arrête tout.
 * - outbound : lignes texte -> bus. Best-effort par ligne : une erreur est loggée, on continue.
 *
 * Les deux boucles observent un unique CancellationToken. Les écritures en cours
 * se terminent avant l'arrêt (le token n'est regardé qu'entre deux messages).
 */

mod inbound;
mod outbound;

pub use inbound::{InboundDispatcher, InboundOptions, InboundState, InboundStats};
pub use outbound::{LineOutcome, OutboundOptions, OutboundPublisher, OutboundStats};
