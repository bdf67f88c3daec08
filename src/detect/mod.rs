// Bundle payload sniffing — keeps HTML-error-page responses out of the resolver.

pub mod bundle;
