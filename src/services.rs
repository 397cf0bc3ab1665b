use std::collections::{BTreeMap, BTreeSet};

const SERVICES_DIRECTORY: &str = "META-INF/services/";

/// Service provider listings, collected from `META-INF/services/*` files and `provides` directives of modules.
#[derive(Debug, Default)]
pub(crate) struct Services {
	providers: BTreeMap<String, BTreeSet<String>>,
}

impl Services {
	/// Returns the service name if the jar entry is a service listing.
	pub(crate) fn service_of(entry: &str) -> Option<&str> {
		entry.strip_prefix(SERVICES_DIRECTORY)
			.filter(|service| !service.is_empty() && !service.contains('/'))
	}

	pub(crate) fn add(&mut self, service: impl Into<String>, provider: impl Into<String>) {
		self.providers.entry(service.into()).or_default().insert(provider.into());
	}

	/// Adds all providers of a listing file, one per line.
	pub(crate) fn add_listing(&mut self, service: &str, listing: &str) {
		let providers = self.providers.entry(service.to_owned()).or_default();
		providers.extend(listing.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty())
			.map(str::to_owned));
	}

	/// The listing files, with sorted providers.
	pub(crate) fn files(&self) -> impl Iterator<Item=(String, String)> + '_ {
		self.providers.iter().map(|(service, providers)| {
			let content = providers.iter().map(|provider| format!("{provider}\n")).collect();
			(format!("{SERVICES_DIRECTORY}{service}"), content)
		})
	}
}

#[cfg(test)]
mod testing {
	use pretty_assertions::assert_eq;
	use crate::services::Services;

	#[test]
	fn listings_are_merged() {
		let mut services = Services::default();
		services.add_listing("a.Service", "  b.Impl\r\n\na.Impl\n");
		services.add("a.Service", "b.Impl");
		services.add("a.Service", "c.Impl");
		services.add("z.Other", "z.Impl");

		assert_eq!(services.files().collect::<Vec<_>>(), vec![
			("META-INF/services/a.Service".to_owned(), "a.Impl\nb.Impl\nc.Impl\n".to_owned()),
			("META-INF/services/z.Other".to_owned(), "z.Impl\n".to_owned()),
		]);
	}

	#[test]
	fn service_names() {
		assert_eq!(Services::service_of("META-INF/services/a.Service"), Some("a.Service"));
		assert_eq!(Services::service_of("META-INF/services/"), None);
		assert_eq!(Services::service_of("META-INF/services/a/b"), None);
		assert_eq!(Services::service_of("META-INF/MANIFEST.MF"), None);
	}
}
