/*!
# NagMQ DevKit - Doublures de test pour le bridge

Permet de tester les boucles de dispatch sans broker ni fichier de commandes :
- `MockBus` : bus en mémoire (routage par pattern, injection de pannes)
- `MemorySink` : fichier de commandes en mémoire
- `fixtures` : check results, lignes et enveloppes prêts à l'emploi
- `TestHarness` : attente active sur les effets observables
*/

pub mod bus_stub;
pub mod fixtures;
pub mod sink_stub;
pub mod test_utils;

pub use bus_stub::MockBus;
pub use sink_stub::MemorySink;
pub use test_utils::TestHarness;
