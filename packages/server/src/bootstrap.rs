//! Browser page that mirrors a session into a mount element and relays
//! interactions back over the WebSocket.

use dynaser_protocol::MountPoint;

use crate::handler::REPLACED_CLOSE_CODE;

const BOOTSTRAP_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>dynaser</title>
</head>
<body>
__FILLERS__<__MOUNT_TAG__ id="dynaser-app"></__MOUNT_TAG__>
<script>
(function () {
  var MOUNT = "html>body>__MOUNT_SEGMENT__";
  var SESSION = "__SESSION__";
  var EVENTS = [
    "click", "dblclick", "change", "mouseover", "mouseout", "mousedown",
    "mouseup", "mousemove", "keydown", "keypress", "keyup", "focus", "blur",
    "submit", "reset", "resize", "scroll", "select"
  ];
  var mount = document.getElementById("dynaser-app");
  var socket = null;
  var retry = 500;

  function segment(el) {
    var tag = el.tagName.toLowerCase();
    if (tag === "html" || tag === "head" || tag === "body") return tag;
    var n = 1;
    for (var sib = el.previousElementSibling; sib; sib = sib.previousElementSibling) {
      if (sib.tagName === el.tagName) n++;
    }
    return tag + ":nth-of-type(" + n + ")";
  }

  function selectorOf(el) {
    var parts = [];
    for (; el && el.nodeType === 1; el = el.parentElement) parts.unshift(segment(el));
    return parts.join(">");
  }

  function toServer(sel) {
    if (sel === MOUNT) return "html>body";
    if (sel.indexOf(MOUNT + ">") !== 0) return null;
    return "html>body>" + sel.slice(MOUNT.length + 1);
  }

  function toClient(sel) {
    if (sel === "html>body") return MOUNT;
    if (sel.indexOf("html>body>") !== 0) return null;
    return MOUNT + ">" + sel.slice("html>body>".length);
  }

  function resolve(sel) {
    var client = toClient(sel);
    if (!client) return null;
    try { return document.querySelector(client); } catch (e) { return null; }
  }

  function applyInitial(content) {
    var incoming = new DOMParser().parseFromString(content, "text/html");
    mount.innerHTML = incoming.body ? incoming.body.innerHTML : "";
    if (incoming.title) document.title = incoming.title;
  }

  function applyMutation(record) {
    var target = resolve(record.selector);
    if (!target) return;

    (record.addedNodes || []).forEach(function (html) {
      try { target.insertAdjacentHTML("beforeend", html); } catch (e) { console.debug(e); }
    });

    (record.removedNodes || []).forEach(function (removed) {
      var name = String(removed.tagName).toLowerCase();
      for (var child = target.firstChild; child; child = child.nextSibling) {
        if (child.nodeName.toLowerCase() === name) { target.removeChild(child); break; }
      }
    });

    var attr = record.attribute;
    if (attr) {
      if (attr.value === null || attr.value === undefined) {
        target.removeAttribute(attr.name);
      } else if (attr.name === "value" && "value" in target) {
        target.value = attr.value;
      } else {
        try { target.setAttribute(attr.name, attr.value); } catch (e) { console.debug(e); }
      }
    }

    var text = record.characterData;
    if (text) {
      var index = 0;
      for (var node = target.firstChild; node; node = node.nextSibling) {
        if (node.nodeType !== 3) continue;
        if (index === text.index) { node.data = text.data; break; }
        index++;
      }
    }
  }

  function send(message) {
    if (socket && socket.readyState === WebSocket.OPEN) socket.send(JSON.stringify(message));
  }

  EVENTS.forEach(function (type) {
    document.addEventListener(type, function (event) {
      var el = event.target;
      if (!(el instanceof Element)) return;
      var selector = toServer(selectorOf(el));
      if (!selector) return;
      if (type === "submit") event.preventDefault();
      var message = { type: "event", eventType: type, selector: selector };
      if (/^(INPUT|TEXTAREA|SELECT)$/.test(el.tagName)) message.value = el.value;
      send(message);
    }, true);
  });

  function connect() {
    var scheme = location.protocol === "https:" ? "wss:" : "ws:";
    socket = new WebSocket(scheme + "//" + location.host + "/ws?session=" + encodeURIComponent(SESSION));
    socket.onopen = function () { retry = 500; };
    socket.onmessage = function (event) {
      var message;
      try { message = JSON.parse(event.data); } catch (e) { console.warn("malformed message", e); return; }
      if (message.type === "initial") applyInitial(message.content);
      else if (message.type === "mutation") applyMutation(message);
      else if (message.type === "event") console.log("server event", message);
    };
    socket.onclose = function (event) {
      // another tab took over this session
      if (event.code === __REPLACED_CODE__) return;
      setTimeout(connect, retry);
      retry = Math.min(retry * 2, 10000);
    };
  }

  connect();
})();
</script>
</body>
</html>
"#;

/// Render the page for `session`. The id must already be validated.
pub fn page(mount: &MountPoint, session: &str) -> String {
    let tag = &mount.segment.tag;
    // earlier siblings of the same tag keep the mount at its configured ordinal
    let fillers: String = (1..mount.segment.ordinal)
        .map(|_| format!("<{tag} hidden></{tag}>\n"))
        .collect();

    BOOTSTRAP_HTML
        .replace("__FILLERS__", &fillers)
        .replace("__MOUNT_TAG__", tag)
        .replace("__MOUNT_SEGMENT__", &mount.segment.to_string())
        .replace("__SESSION__", session)
        .replace("__REPLACED_CODE__", &REPLACED_CLOSE_CODE.to_string())
}
